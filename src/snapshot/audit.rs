//! Consistent-cut audit.
//!
//! For every edge a -> b of a completed round:
//!   sent_a[b] (at a's cut) == received_b[a] (at b's cut) + len(log of a -> b)
//! i.e. each message a sent before its cut was either consumed by b before
//! b's cut, or is captured as in flight. Nothing is lost and nothing from
//! after a's cut leaks in.
//!
//! With the default `M_<from>_to_<to>` payloads the audit also checks that
//! every logged message was recorded on the edge it was addressed to.

use std::fmt;

use crate::consts::Pid;
use crate::traffic::parse_default_payload;

use super::GlobalSnapshot;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Violation {
    /// A process referenced as a peer has no record in the snapshot.
    MissingProcess { pid: Pid },
    /// The cut equation does not hold for edge from -> to.
    CutMismatch {
        from: Pid,
        to: Pid,
        sent: u64,
        received: u64,
        in_flight: u64,
    },
    /// A recorded payload names a different edge.
    Misrouted { from: Pid, to: Pid, payload: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::MissingProcess { pid } => write!(f, "process {} missing from snapshot", pid),
            Violation::CutMismatch { from, to, sent, received, in_flight } => write!(
                f,
                "edge {}->{}: sent {} != received {} + in flight {}",
                from, to, sent, received, in_flight
            ),
            Violation::Misrouted { from, to, payload } => {
                write!(f, "edge {}->{}: recorded foreign message {:?}", from, to, payload)
            }
        }
    }
}

/// Check a collected snapshot; an empty result means the cut is consistent.
pub fn audit(snap: &GlobalSnapshot) -> Vec<Violation> {
    let mut out = Vec::new();

    for (from, to) in snap.edges() {
        let Some(sender) = snap.processes.get(&from) else {
            out.push(Violation::MissingProcess { pid: from });
            continue;
        };
        // pid внутри записи может не совпадать с ключом (ручной JSONL)
        let Some(receiver) = snap.processes.get(&to) else {
            out.push(Violation::MissingProcess { pid: to });
            continue;
        };
        let log = receiver.in_channels.get(&from).map(Vec::as_slice).unwrap_or_default();

        let sent = sender.sent.get(&to).copied().unwrap_or(0);
        let received = receiver.received.get(&from).copied().unwrap_or(0);
        let in_flight = log.len() as u64;
        if sent != received + in_flight {
            out.push(Violation::CutMismatch { from, to, sent, received, in_flight });
        }

        for payload in log {
            if let Some(edge) = parse_default_payload(payload) {
                if edge != (from, to) {
                    out.push(Violation::Misrouted { from, to, payload: payload.clone() });
                }
            }
        }
    }

    out.sort_by_key(|v| match v {
        Violation::MissingProcess { pid } => (0, *pid, 0),
        Violation::CutMismatch { from, to, .. } => (1, *from, *to),
        Violation::Misrouted { from, to, .. } => (2, *from, *to),
    });
    out.dedup();
    out
}
