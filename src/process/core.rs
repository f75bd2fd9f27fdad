use anyhow::{bail, Result};
use log::{debug, trace};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::channel::{Channel, Message};
use crate::consts::Pid;
use crate::metrics::{record_app_received, record_app_sent};

/// Mutable part of a process, guarded by `Process::inner`.
#[derive(Debug, Default)]
pub(super) struct ProcessInner {
    pub state: i64,
    pub in_channels: BTreeMap<Pid, Arc<Channel>>,
    pub out_channels: BTreeMap<Pid, Arc<Channel>>,

    // ----- snapshot bookkeeping (cleared by reset) -----
    // раунд, маркеры которого сейчас принимаются
    pub round: u64,
    pub has_recorded_state: bool,
    pub recorded_state: i64,
    pub marker_count: usize,

    // ----- cumulative traffic counters (never reset) -----
    pub sent: BTreeMap<Pid, u64>,
    pub received: BTreeMap<Pid, u64>,
    // значения счётчиков в момент записи локального состояния
    pub recorded_sent: BTreeMap<Pid, u64>,
    pub recorded_received: BTreeMap<Pid, u64>,
}

/// One simulated node: integer state, inbound/outbound channels per peer and
/// the snapshot protocol bookkeeping.
#[derive(Debug)]
pub struct Process {
    pid: Pid,
    verbose: bool,
    pub(super) inner: Mutex<ProcessInner>,
}

impl Process {
    pub fn new(pid: Pid) -> Self {
        Self::with_verbose(pid, false)
    }

    /// `verbose` lifts per-message logging from trace to debug.
    pub fn with_verbose(pid: Pid, verbose: bool) -> Self {
        Self {
            pid,
            verbose,
            inner: Mutex::new(ProcessInner::default()),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, ProcessInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn chatter(&self, line: std::fmt::Arguments<'_>) {
        if self.verbose {
            debug!("{}", line);
        } else {
            trace!("{}", line);
        }
    }

    /// Create the pair of channels self->other and other->self.
    ///
    /// Must be called before any loop starts. A pair can be connected only
    /// once, and a process cannot be connected to itself.
    pub fn connect_to(&self, other: &Process) -> Result<()> {
        if other.pid == self.pid {
            bail!("process {} cannot be connected to itself", self.pid);
        }
        if self.lock().out_channels.contains_key(&other.pid) {
            bail!("processes {} and {} are already connected", self.pid, other.pid);
        }

        let forward = Arc::new(Channel::new());
        let backward = Arc::new(Channel::new());

        // Два отдельных захвата: никогда не держим два process-лока сразу.
        {
            let mut g = self.lock();
            g.out_channels.insert(other.pid, forward.clone());
            g.in_channels.insert(other.pid, backward.clone());
        }
        {
            let mut g = other.lock();
            g.out_channels.insert(self.pid, backward);
            g.in_channels.insert(self.pid, forward);
        }
        Ok(())
    }

    /// Send an application message to `to`. Unknown peer is a silent no-op.
    pub fn send_message<S: Into<String>>(&self, to: Pid, payload: S) {
        let mut g = self.lock();
        let Some(ch) = g.out_channels.get(&to).cloned() else {
            return;
        };
        let payload = payload.into();
        self.chatter(format_args!("process {} sending message: {}", self.pid, payload));
        ch.send(Message::App(payload));
        *g.sent.entry(to).or_insert(0) += 1;
        record_app_sent();
    }

    /// Poll the inbound channel from `from` once.
    ///
    /// MARKER runs the marker rules (markers of another round are dropped),
    /// an application message updates state, an empty channel (or unknown
    /// peer) returns None without side effects.
    pub fn receive_message(&self, from: Pid) -> Option<Message> {
        let mut g = self.lock();
        let ch = g.in_channels.get(&from).cloned()?;
        let msg = ch.receive()?;
        match &msg {
            Message::Marker(round) => {
                self.chatter(format_args!(
                    "process {} received MARKER of round {} from {}",
                    self.pid, round, from
                ));
                self.handle_marker(&mut g, from, *round);
            }
            Message::App(payload) => {
                self.chatter(format_args!(
                    "process {} received message from {}: {}",
                    self.pid, from, payload
                ));
                *g.received.entry(from).or_insert(0) += 1;
                record_app_received();
                self.apply_message(&mut g);
            }
        }
        Some(msg)
    }

    /// Poll every inbound channel once. Returns the number of messages taken.
    pub fn receive_from_all_in_channels(&self) -> usize {
        self.in_peers()
            .into_iter()
            .filter(|&from| self.receive_message(from).is_some())
            .count()
    }

    /// Application-level effect of a message: state += 1.
    ///
    /// The payload itself is not interpreted.
    pub fn handle_message(&self, _payload: &str) {
        let mut g = self.lock();
        self.apply_message(&mut g);
    }

    fn apply_message(&self, g: &mut ProcessInner) {
        g.state += 1;
        self.chatter(format_args!("process {} incremented state to {}", self.pid, g.state));
    }

    /// Overwrite state (initial seeding, outside the protocol).
    pub fn update_state(&self, amount: i64) {
        self.chatter(format_args!("process {} updated state to {}", self.pid, amount));
        self.lock().state = amount;
    }

    pub fn state(&self) -> i64 {
        self.lock().state
    }

    pub fn in_peers(&self) -> Vec<Pid> {
        self.lock().in_channels.keys().copied().collect()
    }

    pub fn out_peers(&self) -> Vec<Pid> {
        self.lock().out_channels.keys().copied().collect()
    }

    /// Shared handle to the channel `from -> self`.
    pub fn in_channel(&self, from: Pid) -> Option<Arc<Channel>> {
        self.lock().in_channels.get(&from).cloned()
    }

    /// Shared handle to the channel `self -> to`.
    pub fn out_channel(&self, to: Pid) -> Option<Arc<Channel>> {
        self.lock().out_channels.get(&to).cloned()
    }

    /// Cumulative application messages sent to `to`.
    pub fn sent_to(&self, to: Pid) -> u64 {
        self.lock().sent.get(&to).copied().unwrap_or(0)
    }

    /// Cumulative application messages received from `from`.
    pub fn received_from(&self, from: Pid) -> u64 {
        self.lock().received.get(&from).copied().unwrap_or(0)
    }
}
