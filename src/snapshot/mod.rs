//! Global snapshots: coordination, result types and consistency audit.
//! - manager.rs: SnapshotManager (reset, initiate, round guard, quiescence, collect).
//! - result.rs: SnapshotResult / GlobalSnapshot.
//! - audit.rs: consistent-cut check over a collected GlobalSnapshot.

mod audit;
mod manager;
mod result;

pub use audit::{audit, Violation};
pub use manager::SnapshotManager;
pub use result::{GlobalSnapshot, SnapshotResult};
