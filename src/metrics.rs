//! Lightweight global metrics for SnapNet.
//!
//! Потокобезопасные атомарные счётчики:
//! - application traffic (sent / received)
//! - markers (sent / received / dropped as stale)
//! - snapshot rounds (initiated / completed / rejected / stalled)

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

// ----- Traffic -----
static APP_MESSAGES_SENT: AtomicU64 = AtomicU64::new(0);
static APP_MESSAGES_RECEIVED: AtomicU64 = AtomicU64::new(0);

// ----- Markers -----
static MARKERS_SENT: AtomicU64 = AtomicU64::new(0);
static MARKERS_RECEIVED: AtomicU64 = AtomicU64::new(0);
static MARKERS_STALE: AtomicU64 = AtomicU64::new(0);

// ----- Rounds -----
static ROUNDS_INITIATED: AtomicU64 = AtomicU64::new(0);
static ROUNDS_COMPLETED: AtomicU64 = AtomicU64::new(0);
static ROUNDS_REJECTED: AtomicU64 = AtomicU64::new(0);
static ROUNDS_STALLED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    // Traffic
    pub app_messages_sent: u64,
    pub app_messages_received: u64,

    // Markers
    pub markers_sent: u64,
    pub markers_received: u64,
    /// Markers of a round other than the receiver's current one.
    #[serde(default)]
    pub markers_stale: u64,

    // Rounds
    pub rounds_initiated: u64,
    pub rounds_completed: u64,
    pub rounds_rejected: u64,
    pub rounds_stalled: u64,
}

impl MetricsSnapshot {
    /// Application messages still sitting in some queue (or being processed).
    pub fn app_in_flight(&self) -> u64 {
        self.app_messages_sent.saturating_sub(self.app_messages_received)
    }

    pub fn completion_ratio(&self) -> f64 {
        if self.rounds_initiated == 0 {
            0.0
        } else {
            self.rounds_completed as f64 / self.rounds_initiated as f64
        }
    }
}

// ----- Recorders (Traffic) -----
pub fn record_app_sent() {
    APP_MESSAGES_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn record_app_received() {
    APP_MESSAGES_RECEIVED.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Markers) -----
pub fn record_markers_sent(n: usize) {
    MARKERS_SENT.fetch_add(n as u64, Ordering::Relaxed);
}
pub fn record_marker_received() {
    MARKERS_RECEIVED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_marker_stale() {
    MARKERS_STALE.fetch_add(1, Ordering::Relaxed);
}

// ----- Recorders (Rounds) -----
pub fn record_round_initiated() {
    ROUNDS_INITIATED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_round_completed() {
    ROUNDS_COMPLETED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_round_rejected() {
    ROUNDS_REJECTED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_round_stalled() {
    ROUNDS_STALLED.fetch_add(1, Ordering::Relaxed);
}

/// Take a snapshot of all counters.
pub fn snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        app_messages_sent: APP_MESSAGES_SENT.load(Ordering::Relaxed),
        app_messages_received: APP_MESSAGES_RECEIVED.load(Ordering::Relaxed),
        markers_sent: MARKERS_SENT.load(Ordering::Relaxed),
        markers_received: MARKERS_RECEIVED.load(Ordering::Relaxed),
        markers_stale: MARKERS_STALE.load(Ordering::Relaxed),
        rounds_initiated: ROUNDS_INITIATED.load(Ordering::Relaxed),
        rounds_completed: ROUNDS_COMPLETED.load(Ordering::Relaxed),
        rounds_rejected: ROUNDS_REJECTED.load(Ordering::Relaxed),
        rounds_stalled: ROUNDS_STALLED.load(Ordering::Relaxed),
    }
}

/// Reset all counters (tests / benches).
pub fn reset() {
    APP_MESSAGES_SENT.store(0, Ordering::Relaxed);
    APP_MESSAGES_RECEIVED.store(0, Ordering::Relaxed);
    MARKERS_SENT.store(0, Ordering::Relaxed);
    MARKERS_RECEIVED.store(0, Ordering::Relaxed);
    MARKERS_STALE.store(0, Ordering::Relaxed);
    ROUNDS_INITIATED.store(0, Ordering::Relaxed);
    ROUNDS_COMPLETED.store(0, Ordering::Relaxed);
    ROUNDS_REJECTED.store(0, Ordering::Relaxed);
    ROUNDS_STALLED.store(0, Ordering::Relaxed);
}
