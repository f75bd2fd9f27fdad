//! Application traffic generation (pluggable).
//!
//! The process loop asks a [`TrafficPolicy`] once per iteration whether to
//! send a message and to whom. The default policy picks a random peer and
//! produces `M_<from>_to_<to>` payloads.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::consts::Pid;

/// Message-production hook consumed by [`Process::run_process_loop`].
///
/// [`Process::run_process_loop`]: crate::process::Process::run_process_loop
pub trait TrafficPolicy: Send + Sync {
    /// Return `(to, payload)` to send one message this iteration, or None.
    ///
    /// `peers` lists every other process in the session; a target without an
    /// outbound edge is silently dropped by `send_message`.
    fn next_message(&self, from: Pid, peers: &[Pid], rng: &mut StdRng) -> Option<(Pid, String)>;
}

/// One message per iteration to a uniformly chosen peer.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomPeer;

impl TrafficPolicy for RandomPeer {
    fn next_message(&self, from: Pid, peers: &[Pid], rng: &mut StdRng) -> Option<(Pid, String)> {
        let to = *peers.choose(rng)?;
        Some((to, default_payload(from, to)))
    }
}

/// Send with the given probability, otherwise stay quiet.
#[derive(Clone, Copy, Debug)]
pub struct Bernoulli {
    pub p: f64,
}

impl TrafficPolicy for Bernoulli {
    fn next_message(&self, from: Pid, peers: &[Pid], rng: &mut StdRng) -> Option<(Pid, String)> {
        if !rng.gen_bool(self.p.clamp(0.0, 1.0)) {
            return None;
        }
        RandomPeer.next_message(from, peers, rng)
    }
}

/// No application traffic at all (only markers move).
#[derive(Clone, Copy, Debug, Default)]
pub struct Silent;

impl TrafficPolicy for Silent {
    fn next_message(&self, _from: Pid, _peers: &[Pid], _rng: &mut StdRng) -> Option<(Pid, String)> {
        None
    }
}

pub fn default_payload(from: Pid, to: Pid) -> String {
    format!("M_{}_to_{}", from, to)
}

/// Parse `M_<from>_to_<to>`; None for foreign payload formats.
pub fn parse_default_payload(payload: &str) -> Option<(Pid, Pid)> {
    let rest = payload.strip_prefix("M_")?;
    let (from, to) = rest.split_once("_to_")?;
    Some((from.parse().ok()?, to.parse().ok()?))
}
