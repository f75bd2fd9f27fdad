#![allow(non_snake_case)]

// Ядро протокола
pub mod consts;
pub mod channel;
pub mod process;
pub mod snapshot;

// Оркестрация (драйвер, топологии, трафик, вывод)
pub mod config;
pub mod metrics;
pub mod topology;
pub mod traffic;
pub mod sink;
pub mod sim;

// CLI (используется бинарником snapnet)
pub mod cli;

// Удобные реэкспорты
pub use channel::{Channel, Message};
pub use config::{SimBuilder, SimConfig};
pub use consts::Pid;
pub use process::{Phase, Process};
pub use sim::{SessionReport, Simulation};
pub use snapshot::{audit, GlobalSnapshot, SnapshotManager, SnapshotResult, Violation};
pub use topology::Topology;
pub use traffic::{RandomPeer, Silent, TrafficPolicy};
