//! Константы протокола и значения по умолчанию для симуляции.

use std::time::Duration;

/// Identifier of a simulated process.
pub type Pid = u32;

/// Textual form of the control message (logs, DOT output).
pub const MARKER: &str = "MARKER";

// ----- Session defaults (overridable via SNAPNET_* env / CLI) -----
pub const DEFAULT_PROCESSES: usize = 5;
pub const DEFAULT_RUN_SECS: u64 = 15;
pub const DEFAULT_SEED: u64 = 42;

pub const DEFAULT_SEND_MIN_MS: u64 = 500;
pub const DEFAULT_SEND_MAX_MS: u64 = 1000;

pub const DEFAULT_SNAPSHOT_MIN_MS: u64 = 3000;
pub const DEFAULT_SNAPSHOT_MAX_MS: u64 = 6000;

/// Pause after initiation before the driver starts polling for quiescence.
pub const DEFAULT_SETTLE_MS: u64 = 500;
/// Upper bound for a single round to reach DONE on every process.
pub const DEFAULT_ROUND_TIMEOUT_MS: u64 = 5000;

/// Initial state of each process is drawn from this inclusive range.
pub const DEFAULT_INITIAL_STATE_MIN: i64 = 5;
pub const DEFAULT_INITIAL_STATE_MAX: i64 = 20;

/// Poll step used while waiting for quiescence or for the stop flag.
pub const POLL_STEP: Duration = Duration::from_millis(10);
