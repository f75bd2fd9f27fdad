//! Snapshot manager: reset, initiate, quiescence, collect.
//!
//! One round at a time. The manager numbers rounds and refuses to start a
//! new one while the previous round is still in flight (some process has
//! recorded its state but is not DONE yet). A stalled round can be dropped
//! with `abandon_round()`; its markers may stay queued, but they carry the
//! old round number and the processes ignore them.
//!
//! Bypassing the manager (calling `Process::take_snapshot` directly without
//! a reset) is not checked and leaves stale bookkeeping behind.

use anyhow::{anyhow, bail, Result};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::consts::{Pid, POLL_STEP};
use crate::metrics::{
    record_round_completed, record_round_initiated, record_round_rejected, record_round_stalled,
};
use crate::process::{Phase, Process};

use super::{GlobalSnapshot, SnapshotResult};

#[derive(Debug, Default)]
struct RoundState {
    // номер последнего начатого раунда (0 — раундов ещё не было)
    round: u64,
    initiator: Option<Pid>,
    open: bool,
}

pub struct SnapshotManager {
    processes: BTreeMap<Pid, Arc<Process>>,
    round: Mutex<RoundState>,
}

impl SnapshotManager {
    pub fn new(processes: BTreeMap<Pid, Arc<Process>>) -> Self {
        Self {
            processes,
            round: Mutex::new(RoundState::default()),
        }
    }

    fn lock_round(&self) -> MutexGuard<'_, RoundState> {
        self.round.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn process_ids(&self) -> Vec<Pid> {
        self.processes.keys().copied().collect()
    }

    pub fn process(&self, pid: Pid) -> Option<&Arc<Process>> {
        self.processes.get(&pid)
    }

    /// Number of the most recently started round (0 before the first one).
    pub fn current_round(&self) -> u64 {
        self.lock_round().round
    }

    /// Whether a started round has been neither completed nor abandoned.
    pub fn round_open(&self) -> bool {
        self.lock_round().open
    }

    /// Reset every process to IDLE and start a new round from `starter`.
    ///
    /// Returns the new round number. Fails for an unknown `starter` and while
    /// the previous round is still in flight.
    pub fn initiate_snapshot(&self, starter: Pid) -> Result<u64> {
        let proc = self
            .processes
            .get(&starter)
            .ok_or_else(|| anyhow!("unknown initiator pid {}", starter))?;

        let mut r = self.lock_round();
        if r.open && !self.is_quiescent() {
            record_round_rejected();
            bail!(
                "snapshot round {} (initiator {:?}) is still in flight",
                r.round,
                r.initiator
            );
        }

        r.round += 1;
        self.reset_to(r.round);
        r.initiator = Some(starter);
        r.open = true;
        proc.take_snapshot();
        record_round_initiated();

        info!("snapshot round {} initiated by pid={}", r.round, starter);
        Ok(r.round)
    }

    /// Back to IDLE everywhere: bookkeeping zeroed, inbound logs stopped and cleared.
    /// Idempotent.
    ///
    /// Processes are parked on round 0, which the manager never issues, so
    /// every marker still queued from earlier rounds is dropped on arrival.
    pub fn reset_all_processes(&self) {
        self.reset_to(0);
    }

    fn reset_to(&self, round: u64) {
        for p in self.processes.values() {
            p.reset_protocol(round);
        }
        debug!("reset {} process(es) to round {}", self.processes.len(), round);
    }

    /// Every process is DONE for the current round.
    pub fn is_quiescent(&self) -> bool {
        self.processes.values().all(|p| p.phase() == Phase::Done)
    }

    /// Phase of every process.
    pub fn phases(&self) -> BTreeMap<Pid, Phase> {
        self.processes.iter().map(|(pid, p)| (*pid, p.phase())).collect()
    }

    /// Poll until every process is DONE.
    ///
    /// Fails after `timeout`, or as soon as `cancel` (if given) is raised.
    pub fn wait_for_quiescence(&self, timeout: Duration, cancel: Option<&AtomicBool>) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.is_quiescent() {
                return Ok(());
            }
            if cancel.map_or(false, |c| c.load(Ordering::Relaxed)) {
                bail!("round {} interrupted before quiescence", self.current_round());
            }
            if Instant::now() >= deadline {
                let pending: Vec<Pid> = self
                    .phases()
                    .into_iter()
                    .filter(|(_, ph)| *ph != Phase::Done)
                    .map(|(pid, _)| pid)
                    .collect();
                bail!(
                    "round {} did not quiesce within {:?}; not done: {:?}",
                    self.current_round(),
                    timeout,
                    pending
                );
            }
            std::thread::sleep(POLL_STEP);
        }
    }

    /// Per-process results, read without any completeness check.
    pub fn collect_results(&self) -> BTreeMap<Pid, SnapshotResult> {
        self.processes
            .iter()
            .map(|(pid, p)| (*pid, p.get_snapshot_result()))
            .collect()
    }

    /// Close the open round and assemble its GlobalSnapshot.
    ///
    /// Fails when no round is open or some process is not DONE yet.
    pub fn complete_round(&self) -> Result<GlobalSnapshot> {
        let mut r = self.lock_round();
        if !r.open {
            bail!("no snapshot round is open");
        }
        if !self.is_quiescent() {
            bail!("snapshot round {} has not quiesced yet", r.round);
        }
        let initiator = r
            .initiator
            .ok_or_else(|| anyhow!("round {} has no initiator", r.round))?;

        let snap = GlobalSnapshot {
            round: r.round,
            initiator,
            processes: self.collect_results(),
        };
        r.open = false;
        record_round_completed();
        info!(
            "snapshot round {} complete: total state {}, {} message(s) in flight",
            snap.round,
            snap.total_state(),
            snap.in_flight_count()
        );
        Ok(snap)
    }

    /// Give up on the open round (e.g. after a quiescence timeout).
    pub fn abandon_round(&self) {
        let mut r = self.lock_round();
        if r.open {
            r.open = false;
            record_round_stalled();
            warn!("snapshot round {} abandoned", r.round);
        }
    }
}
