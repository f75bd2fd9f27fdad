//! Simulated process (one node of the network).
//!
//! Split into submodules:
//! - core.rs: Process struct, wiring (connect_to), send/receive, accessors.
//! - protocol.rs: snapshot protocol (marker rules, take_snapshot, reset, results).
//! - run.rs: the long-running per-process loop.
//!
//! Locking: one mutex per process guards its state, bookkeeping and channel
//! maps. Every channel call made on behalf of a process happens while that
//! mutex is held, so the lock order is always process -> channel.

mod core;
mod protocol;
mod run;

use serde::{Deserialize, Serialize};

pub use self::core::Process;

/// Local view of the current snapshot round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Local state not recorded yet.
    Idle,
    /// Local state recorded, still waiting for markers on some inbound channels.
    Recording,
    /// A marker arrived on every inbound channel; recording stopped.
    Done,
}
