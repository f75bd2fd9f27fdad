//! Centralized configuration and builder for a SnapNet session.
//!
//! Goals:
//! - Single place for session tunables instead of scattered constants.
//! - SimConfig::from_env() reads SNAPNET_* variables; CLI flags override them.
//! - SimBuilder for programmatic use (tests, embedding).
//!
//! Environment:
//! - SNAPNET_PROCESSES         number of processes (default 5)
//! - SNAPNET_RUN_SECS          session length in seconds (default 15)
//! - SNAPNET_SEED              RNG seed (default 42)
//! - SNAPNET_SEND_MIN_MS / SNAPNET_SEND_MAX_MS           per-iteration pause (500..1000)
//! - SNAPNET_SNAPSHOT_MIN_MS / SNAPNET_SNAPSHOT_MAX_MS   pause between rounds (3000..6000)
//! - SNAPNET_SETTLE_MS         delay before polling for quiescence (500)
//! - SNAPNET_ROUND_TIMEOUT_MS  quiescence timeout per round (5000)
//! - SNAPNET_VERBOSE           0|1|true|false|on|off|yes|no

use anyhow::{bail, Result};
use std::fmt;
use std::time::Duration;

use crate::consts::*;

#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    /// Number of processes (pids 1..=processes).
    pub processes: usize,
    /// Overall session length.
    pub run_duration: Duration,
    /// Seed for initial states, peer choice and pacing.
    pub seed: u64,
    /// Pause range of one process-loop iteration.
    pub send_interval: (Duration, Duration),
    /// Pause range between two snapshot initiations.
    pub snapshot_interval: (Duration, Duration),
    /// Delay after initiation before polling for quiescence.
    pub settle: Duration,
    /// A round that is not quiescent after this long is abandoned.
    pub round_timeout: Duration,
    /// Inclusive range for the initial state of each process.
    pub initial_state: (i64, i64),
    /// Per-message logging at debug level (otherwise trace).
    pub verbose: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            processes: DEFAULT_PROCESSES,
            run_duration: Duration::from_secs(DEFAULT_RUN_SECS),
            seed: DEFAULT_SEED,
            send_interval: (
                Duration::from_millis(DEFAULT_SEND_MIN_MS),
                Duration::from_millis(DEFAULT_SEND_MAX_MS),
            ),
            snapshot_interval: (
                Duration::from_millis(DEFAULT_SNAPSHOT_MIN_MS),
                Duration::from_millis(DEFAULT_SNAPSHOT_MAX_MS),
            ),
            settle: Duration::from_millis(DEFAULT_SETTLE_MS),
            round_timeout: Duration::from_millis(DEFAULT_ROUND_TIMEOUT_MS),
            initial_state: (DEFAULT_INITIAL_STATE_MIN, DEFAULT_INITIAL_STATE_MAX),
            verbose: false,
        }
    }
}

// ENV helpers
fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse::<u64>().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl SimConfig {
    /// Defaults overridden by SNAPNET_* environment variables.
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_u64("SNAPNET_PROCESSES") {
            cfg.processes = n as usize;
        }
        if let Some(n) = env_u64("SNAPNET_RUN_SECS") {
            cfg.run_duration = Duration::from_secs(n);
        }
        if let Some(n) = env_u64("SNAPNET_SEED") {
            cfg.seed = n;
        }

        // ----- pacing -----
        if let Some(n) = env_u64("SNAPNET_SEND_MIN_MS") {
            cfg.send_interval.0 = Duration::from_millis(n);
        }
        if let Some(n) = env_u64("SNAPNET_SEND_MAX_MS") {
            cfg.send_interval.1 = Duration::from_millis(n);
        }
        if let Some(n) = env_u64("SNAPNET_SNAPSHOT_MIN_MS") {
            cfg.snapshot_interval.0 = Duration::from_millis(n);
        }
        if let Some(n) = env_u64("SNAPNET_SNAPSHOT_MAX_MS") {
            cfg.snapshot_interval.1 = Duration::from_millis(n);
        }

        // ----- rounds -----
        if let Some(n) = env_u64("SNAPNET_SETTLE_MS") {
            cfg.settle = Duration::from_millis(n);
        }
        if let Some(n) = env_u64("SNAPNET_ROUND_TIMEOUT_MS") {
            cfg.round_timeout = Duration::from_millis(n);
        }

        if let Some(on) = env_bool("SNAPNET_VERBOSE") {
            cfg.verbose = on;
        }

        cfg
    }

    /// Reject configurations the driver cannot run.
    pub fn validate(&self) -> Result<()> {
        if self.processes < 2 {
            bail!("need at least 2 processes, got {}", self.processes);
        }
        if self.send_interval.0 > self.send_interval.1 {
            bail!("send interval min {:?} > max {:?}", self.send_interval.0, self.send_interval.1);
        }
        if self.snapshot_interval.0 > self.snapshot_interval.1 {
            bail!(
                "snapshot interval min {:?} > max {:?}",
                self.snapshot_interval.0,
                self.snapshot_interval.1
            );
        }
        if self.snapshot_interval.1.is_zero() {
            bail!("snapshot interval must be non-zero");
        }
        if self.initial_state.0 > self.initial_state.1 {
            bail!(
                "initial state range {}..={} is empty",
                self.initial_state.0,
                self.initial_state.1
            );
        }
        if self.round_timeout.is_zero() {
            bail!("round timeout must be non-zero");
        }
        Ok(())
    }

    // ----- fluent setters (builder-style) -----

    pub fn with_processes(mut self, n: usize) -> Self {
        self.processes = n;
        self
    }

    pub fn with_run_duration(mut self, d: Duration) -> Self {
        self.run_duration = d;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_send_interval(mut self, min: Duration, max: Duration) -> Self {
        self.send_interval = (min, max);
        self
    }

    pub fn with_snapshot_interval(mut self, min: Duration, max: Duration) -> Self {
        self.snapshot_interval = (min, max);
        self
    }

    pub fn with_settle(mut self, d: Duration) -> Self {
        self.settle = d;
        self
    }

    pub fn with_round_timeout(mut self, d: Duration) -> Self {
        self.round_timeout = d;
        self
    }

    pub fn with_initial_state(mut self, min: i64, max: i64) -> Self {
        self.initial_state = (min, max);
        self
    }

    pub fn with_verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }
}

impl fmt::Display for SimConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SimConfig {{ \
             processes: {}, \
             run: {:?}, \
             seed: {}, \
             send: {:?}..{:?}, \
             snapshot: {:?}..{:?}, \
             settle: {:?}, \
             round_timeout: {:?}, \
             initial_state: {}..={}, \
             verbose: {} \
             }}",
            self.processes,
            self.run_duration,
            self.seed,
            self.send_interval.0,
            self.send_interval.1,
            self.snapshot_interval.0,
            self.snapshot_interval.1,
            self.settle,
            self.round_timeout,
            self.initial_state.0,
            self.initial_state.1,
            self.verbose,
        )
    }
}

/// Lightweight builder that produces a SimConfig.
#[derive(Clone, Debug)]
pub struct SimBuilder {
    cfg: SimConfig,
}

impl Default for SimBuilder {
    fn default() -> Self {
        // Start from env, then allow overrides.
        Self {
            cfg: SimConfig::from_env(),
        }
    }
}

impl SimBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from a clean default (without reading env).
    pub fn from_default() -> Self {
        Self {
            cfg: SimConfig::default(),
        }
    }

    pub fn processes(mut self, n: usize) -> Self {
        self.cfg.processes = n;
        self
    }

    pub fn run_millis(mut self, ms: u64) -> Self {
        self.cfg.run_duration = Duration::from_millis(ms);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.cfg.seed = seed;
        self
    }

    pub fn send_millis(mut self, min: u64, max: u64) -> Self {
        self.cfg.send_interval = (Duration::from_millis(min), Duration::from_millis(max));
        self
    }

    pub fn snapshot_millis(mut self, min: u64, max: u64) -> Self {
        self.cfg.snapshot_interval = (Duration::from_millis(min), Duration::from_millis(max));
        self
    }

    pub fn settle_millis(mut self, ms: u64) -> Self {
        self.cfg.settle = Duration::from_millis(ms);
        self
    }

    pub fn round_timeout_millis(mut self, ms: u64) -> Self {
        self.cfg.round_timeout = Duration::from_millis(ms);
        self
    }

    pub fn initial_state(mut self, min: i64, max: i64) -> Self {
        self.cfg.initial_state = (min, max);
        self
    }

    pub fn verbose(mut self, on: bool) -> Self {
        self.cfg.verbose = on;
        self
    }

    /// Finish the builder; the result is validated.
    pub fn build(self) -> Result<SimConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}
