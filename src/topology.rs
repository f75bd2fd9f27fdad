//! Network topologies: which process pairs get a pair of channels.
//!
//! Every edge is bidirectional (`connect_to` creates a->b and b->a), so the
//! edge list is normalized to unordered pairs and deduplicated.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::consts::Pid;
use crate::process::Process;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Topology {
    /// i <-> i+1 (wrapping).
    Ring,
    /// Ring plus i <-> i+2 (wrapping).
    RingWithSkip,
    /// Every pair connected.
    Complete,
    /// Explicit list of pairs.
    Custom(Vec<(Pid, Pid)>),
}

impl Topology {
    /// Unordered, deduplicated pairs over `pids` (sorted order defines the ring).
    pub fn edges(&self, pids: &[Pid]) -> Vec<(Pid, Pid)> {
        let mut sorted: Vec<Pid> = pids.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let n = sorted.len();

        let mut raw: Vec<(Pid, Pid)> = Vec::new();
        match self {
            Topology::Ring | Topology::RingWithSkip => {
                let step_max = if *self == Topology::Ring { 1 } else { 2 };
                for step in 1..=step_max {
                    for i in 0..n {
                        raw.push((sorted[i], sorted[(i + step) % n]));
                    }
                }
            }
            Topology::Complete => {
                for i in 0..n {
                    for j in (i + 1)..n {
                        raw.push((sorted[i], sorted[j]));
                    }
                }
            }
            Topology::Custom(list) => raw.extend(list.iter().copied()),
        }

        let set: BTreeSet<(Pid, Pid)> = raw
            .into_iter()
            .filter(|(a, b)| a != b)
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect();
        set.into_iter().collect()
    }

    /// Connect `processes` according to this topology. Returns the number of
    /// connected pairs.
    pub fn wire(&self, processes: &BTreeMap<Pid, Arc<Process>>) -> Result<usize> {
        let pids: Vec<Pid> = processes.keys().copied().collect();
        let edges = self.edges(&pids);
        for (a, b) in &edges {
            let pa = processes
                .get(a)
                .ok_or_else(|| anyhow!("topology references unknown pid {}", a))?;
            let pb = processes
                .get(b)
                .ok_or_else(|| anyhow!("topology references unknown pid {}", b))?;
            pa.connect_to(pb)?;
        }
        Ok(edges.len())
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topology::Ring => f.write_str("ring"),
            Topology::RingWithSkip => f.write_str("ring-skip"),
            Topology::Complete => f.write_str("complete"),
            Topology::Custom(list) => {
                let parts: Vec<String> = list.iter().map(|(a, b)| format!("{}-{}", a, b)).collect();
                f.write_str(&parts.join(","))
            }
        }
    }
}

impl FromStr for Topology {
    type Err = anyhow::Error;

    /// `ring`, `ring-skip`, `complete`, or pairs like `1-2,2-3,3-1`.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ring" => Ok(Topology::Ring),
            "ring-skip" | "ring_skip" | "skip" => Ok(Topology::RingWithSkip),
            "complete" | "full" => Ok(Topology::Complete),
            other => {
                let mut pairs = Vec::new();
                for part in other.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                    let (a, b) = part
                        .split_once('-')
                        .ok_or_else(|| anyhow!("bad edge '{}': expected <a>-<b>", part))?;
                    let a: Pid = a.trim().parse().with_context(|| format!("bad pid in '{}'", part))?;
                    let b: Pid = b.trim().parse().with_context(|| format!("bad pid in '{}'", part))?;
                    pairs.push((a, b));
                }
                if pairs.is_empty() {
                    bail!("unknown topology '{}'", s);
                }
                Ok(Topology::Custom(pairs))
            }
        }
    }
}
