use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::consts::Pid;

/// Snapshot record of one process.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotResult {
    pub pid: Pid,
    /// Recorded local state.
    pub state: i64,
    /// peer id -> recorded log of the channel peer -> pid.
    pub in_channels: BTreeMap<Pid, Vec<String>>,
    /// peer id -> application messages sent to peer before recording.
    #[serde(default)]
    pub sent: BTreeMap<Pid, u64>,
    /// peer id -> application messages received from peer before recording.
    #[serde(default)]
    pub received: BTreeMap<Pid, u64>,
}

/// Per-process results of one round, tagged with the initiator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSnapshot {
    pub round: u64,
    pub initiator: Pid,
    pub processes: BTreeMap<Pid, SnapshotResult>,
}

impl GlobalSnapshot {
    /// Sum of the recorded process states.
    pub fn total_state(&self) -> i64 {
        self.processes.values().map(|r| r.state).sum()
    }

    /// Number of application messages captured in channel logs.
    pub fn in_flight_count(&self) -> usize {
        self.processes
            .values()
            .flat_map(|r| r.in_channels.values())
            .map(Vec::len)
            .sum()
    }

    /// Recorded log of the channel `from -> to`.
    pub fn channel(&self, from: Pid, to: Pid) -> Option<&[String]> {
        self.processes
            .get(&to)?
            .in_channels
            .get(&from)
            .map(Vec::as_slice)
    }

    /// Every directed edge present in the snapshot as (from, to).
    pub fn edges(&self) -> Vec<(Pid, Pid)> {
        self.processes
            .values()
            .flat_map(|r| r.in_channels.keys().map(move |from| (*from, r.pid)))
            .collect()
    }
}
