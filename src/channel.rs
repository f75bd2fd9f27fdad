//! Directed FIFO channel between two simulated processes.
//!
//! Одна очередь разделяется двумя процессами: отправитель держит её как
//! "out", получатель как "in" (оба через `Arc<Channel>`).
//!
//! Guarantees:
//! - FIFO: messages are received in the order they were sent.
//! - Unbounded, non-blocking `send`; `receive` is a poll (None when empty).
//! - While `recording` is on, every received application message is appended
//!   to the recorded log. MARKER is never recorded.
//! - All operations go through one internal mutex, so they are linearizable
//!   with respect to each other.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::consts::MARKER;

/// A message travelling over a channel: application payload or MARKER.
///
/// A marker carries the number of the snapshot round that emitted it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Message {
    App(String),
    Marker(u64),
}

impl Message {
    pub fn app<S: Into<String>>(payload: S) -> Self {
        Message::App(payload.into())
    }

    pub fn is_marker(&self) -> bool {
        matches!(self, Message::Marker(_))
    }

    /// Payload of an application message (None for MARKER).
    pub fn payload(&self) -> Option<&str> {
        match self {
            Message::App(p) => Some(p.as_str()),
            Message::Marker(_) => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::App(p) => f.write_str(p),
            Message::Marker(round) => write!(f, "{}#{}", MARKER, round),
        }
    }
}

#[derive(Debug, Default)]
struct ChannelInner {
    queue: VecDeque<Message>,
    recording: bool,
    recorded: Vec<String>,
}

/// Thread-safe point-to-point queue with an optional recording mode.
#[derive(Debug, Default)]
pub struct Channel {
    inner: Mutex<ChannelInner>,
}

impl Channel {
    pub fn new() -> Self {
        Self::default()
    }

    // Паника в другом потоке не должна делать канал недоступным:
    // состояние очереди остаётся валидным после любой операции.
    fn lock(&self) -> MutexGuard<'_, ChannelInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message to the tail. Never fails, never blocks.
    pub fn send(&self, msg: Message) {
        self.lock().queue.push_back(msg);
    }

    /// Pop the head message, if any.
    ///
    /// When recording is on and the message is an application message, it is
    /// also appended to the recorded log.
    pub fn receive(&self) -> Option<Message> {
        let mut g = self.lock();
        let msg = g.queue.pop_front()?;
        if g.recording {
            if let Message::App(p) = &msg {
                g.recorded.push(p.clone());
            }
        }
        Some(msg)
    }

    pub fn start_recording(&self) {
        self.lock().recording = true;
    }

    pub fn stop_recording(&self) {
        self.lock().recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recording
    }

    /// Copy of the recorded log (receive order).
    pub fn get_recorded_messages(&self) -> Vec<String> {
        self.lock().recorded.clone()
    }

    pub fn clear_recorded_messages(&self) {
        self.lock().recorded.clear();
    }

    /// Number of messages currently queued (markers included).
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }
}
