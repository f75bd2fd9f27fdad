//! Snapshot protocol rules for a single process.
//!
//! Rules (all under the process lock):
//! 1. First MARKER (or explicit initiation) while IDLE: record local state,
//!    start recording on every inbound channel, then send MARKER on every
//!    outbound channel.
//! 2. Every MARKER: marker_count += 1 and stop recording on the channel that
//!    delivered it. The log of that channel now holds exactly the messages
//!    received between the local recording start and this marker.
//! 3. marker_count == number of inbound channels: stop recording on every
//!    inbound channel (DONE).
//!
//! Rule 2 closes each channel at its own marker rather than keeping every
//! channel open until rule 3 fires; by then rule 3 only stops channels that
//! are already closed.
//!
//! Every marker carries its round number. A process accepts only markers of
//! the round it was last reset to, so markers left behind by an abandoned
//! round are consumed and dropped.

use log::{debug, info};

use crate::channel::Message;
use crate::consts::Pid;
use crate::metrics::{record_marker_received, record_marker_stale, record_markers_sent};
use crate::snapshot::SnapshotResult;

use super::core::{Process, ProcessInner};
use super::Phase;

impl Process {
    /// Rule 1. Caller holds the lock and has checked `!has_recorded_state`.
    fn record_and_forward(&self, g: &mut ProcessInner) {
        g.recorded_state = g.state;
        g.has_recorded_state = true;
        g.recorded_sent = g.sent.clone();
        g.recorded_received = g.received.clone();

        for ch in g.in_channels.values() {
            ch.start_recording();
        }
        for (to, ch) in g.out_channels.iter() {
            ch.send(Message::Marker(g.round));
            self.chatter(format_args!("process {} sent MARKER to {}", self.pid(), to));
        }
        record_markers_sent(g.out_channels.len());

        debug!(
            "process {} recorded state {} ({} in / {} out channels)",
            self.pid(),
            g.recorded_state,
            g.in_channels.len(),
            g.out_channels.len()
        );
    }

    /// Rule 3.
    fn stop_if_complete(&self, g: &mut ProcessInner) {
        if g.marker_count == g.in_channels.len() {
            for ch in g.in_channels.values() {
                ch.stop_recording();
            }
            debug!("process {} done: {} marker(s)", self.pid(), g.marker_count);
        }
    }

    /// Rules 1-3 for a MARKER of `round` that just arrived from `from`.
    pub(super) fn handle_marker(&self, g: &mut ProcessInner, from: Pid, round: u64) {
        record_marker_received();
        if round != g.round {
            record_marker_stale();
            debug!(
                "process {} dropped MARKER of round {} from {} (current round {})",
                self.pid(),
                round,
                from,
                g.round
            );
            return;
        }
        if !g.has_recorded_state {
            self.record_and_forward(g);
        }
        g.marker_count += 1;
        if let Some(ch) = g.in_channels.get(&from) {
            ch.stop_recording();
        }
        self.stop_if_complete(g);
    }

    /// Start a round with this process as the initiator.
    ///
    /// Applies rule 1 without a triggering marker; the markers it sends are
    /// tagged with the round set by the last `reset_protocol`. Returns false
    /// (and does nothing) when the local state is already recorded.
    pub fn take_snapshot(&self) -> bool {
        let mut g = self.lock();
        if g.has_recorded_state {
            return false;
        }
        info!(
            "process {} initiates snapshot round {} (state={})",
            self.pid(),
            g.round,
            g.state
        );
        self.record_and_forward(&mut g);
        // без входящих каналов процесс завершён сразу
        self.stop_if_complete(&mut g);
        true
    }

    /// Back to IDLE for `round`: clear bookkeeping, stop and clear every
    /// inbound log. From now on only markers of `round` are counted.
    pub fn reset_protocol(&self, round: u64) {
        let mut g = self.lock();
        g.round = round;
        g.has_recorded_state = false;
        g.recorded_state = 0;
        g.marker_count = 0;
        g.recorded_sent.clear();
        g.recorded_received.clear();
        for ch in g.in_channels.values() {
            ch.stop_recording();
            ch.clear_recorded_messages();
        }
    }

    pub fn phase(&self) -> Phase {
        let g = self.lock();
        if !g.has_recorded_state {
            Phase::Idle
        } else if g.marker_count >= g.in_channels.len() {
            Phase::Done
        } else {
            Phase::Recording
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase() == Phase::Done
    }

    pub fn has_recorded_state(&self) -> bool {
        self.lock().has_recorded_state
    }

    /// Meaningful only once `has_recorded_state()` is true.
    pub fn recorded_state(&self) -> i64 {
        self.lock().recorded_state
    }

    /// Round this process currently accepts markers for.
    pub fn round(&self) -> u64 {
        self.lock().round
    }

    pub fn marker_count(&self) -> usize {
        self.lock().marker_count
    }

    /// Recorded state plus the recorded log of every inbound channel.
    ///
    /// Only trustworthy once the process is DONE; earlier reads return a
    /// partial snapshot.
    pub fn get_snapshot_result(&self) -> SnapshotResult {
        let g = self.lock();
        SnapshotResult {
            pid: self.pid(),
            state: g.recorded_state,
            in_channels: g
                .in_channels
                .iter()
                .map(|(from, ch)| (*from, ch.get_recorded_messages()))
                .collect(),
            sent: g.recorded_sent.clone(),
            received: g.recorded_received.clone(),
        }
    }
}
