//! Session driver: builds the network, runs every process loop on its own
//! thread, initiates snapshot rounds periodically and hands completed
//! GlobalSnapshots to a sink.
//!
//! Threads:
//! - one per process (Process::run_process_loop)
//! - one initiator thread: sleep, pick a random pid, initiate, settle,
//!   wait for quiescence, complete the round, push the result into an mpsc queue
//!
//! All threads watch a shared stop flag and are joined before results are
//! handed to the sink.

use anyhow::{anyhow, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::SimConfig;
use crate::consts::{Pid, POLL_STEP};
use crate::metrics::{self, MetricsSnapshot};
use crate::process::Process;
use crate::sink::SnapshotSink;
use crate::snapshot::{GlobalSnapshot, SnapshotManager};
use crate::topology::Topology;
use crate::traffic::TrafficPolicy;

/// Outcome of a session.
#[derive(Debug)]
pub struct SessionReport {
    pub snapshots: Vec<GlobalSnapshot>,
    pub rounds_rejected: u64,
    pub rounds_stalled: u64,
    pub metrics: MetricsSnapshot,
}

#[derive(Debug, Default)]
struct InitiatorStats {
    rejected: u64,
    stalled: u64,
}

pub struct Simulation {
    cfg: SimConfig,
    processes: BTreeMap<Pid, Arc<Process>>,
    manager: Arc<SnapshotManager>,
}

impl Simulation {
    /// Processes 1..=cfg.processes, wired by `topology`, seeded from
    /// `cfg.initial_state` with `cfg.seed`.
    pub fn new(cfg: SimConfig, topology: &Topology) -> Result<Self> {
        cfg.validate()?;
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let processes: BTreeMap<Pid, Arc<Process>> = (1..=cfg.processes as Pid)
            .map(|pid| (pid, Arc::new(Process::with_verbose(pid, cfg.verbose))))
            .collect();
        let pairs = topology.wire(&processes)?;

        let (lo, hi) = cfg.initial_state;
        for p in processes.values() {
            p.update_state(rng.gen_range(lo..=hi));
        }

        info!(
            "network ready: {} process(es), {} channel pair(s), topology {}",
            processes.len(),
            pairs,
            topology
        );
        Ok(Self::from_processes(cfg, processes))
    }

    /// Use an already wired and seeded set of processes.
    pub fn from_processes(cfg: SimConfig, processes: BTreeMap<Pid, Arc<Process>>) -> Self {
        let manager = Arc::new(SnapshotManager::new(processes.clone()));
        Self {
            cfg,
            processes,
            manager,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.cfg
    }

    pub fn processes(&self) -> &BTreeMap<Pid, Arc<Process>> {
        &self.processes
    }

    pub fn manager(&self) -> &SnapshotManager {
        &self.manager
    }

    /// Run one session of `cfg.run_duration`; completed snapshots go to `sink`.
    pub fn run(&self, traffic: Arc<dyn TrafficPolicy>, sink: &mut dyn SnapshotSink) -> Result<SessionReport> {
        let stop = Arc::new(AtomicBool::new(false));
        let pids: Vec<Pid> = self.processes.keys().copied().collect();
        let (tx, rx) = mpsc::channel::<GlobalSnapshot>();

        info!("session start: {}", self.cfg);

        let mut workers = Vec::with_capacity(self.processes.len());
        for (pid, proc) in &self.processes {
            let proc = proc.clone();
            let stop = stop.clone();
            let traffic = traffic.clone();
            let peers = pids.clone();
            let send_interval = self.cfg.send_interval;
            let seed = self.cfg.seed ^ (u64::from(*pid)).wrapping_mul(0x9E37_79B9_7F4A_7C15);
            let handle = thread::Builder::new()
                .name(format!("process-{}", pid))
                .spawn(move || {
                    let mut rng = StdRng::seed_from_u64(seed);
                    proc.run_process_loop(&peers, &stop, send_interval, traffic.as_ref(), &mut rng);
                })?;
            workers.push((*pid, handle));
        }

        let initiator = {
            let manager = self.manager.clone();
            let stop = stop.clone();
            let cfg = self.cfg.clone();
            let pids = pids.clone();
            thread::Builder::new()
                .name("snapshot-initiator".into())
                .spawn(move || run_initiator(&manager, &cfg, &pids, &stop, tx))?
        };

        thread::sleep(self.cfg.run_duration);
        stop.store(true, Ordering::Relaxed);

        for (pid, handle) in workers {
            handle
                .join()
                .map_err(|_| anyhow!("process {} thread panicked", pid))?;
        }
        let stats = initiator
            .join()
            .map_err(|_| anyhow!("snapshot initiator thread panicked"))?;

        // Очередь результатов принадлежит драйверу; читаем после join.
        let mut snapshots = Vec::new();
        for snap in rx.try_iter() {
            sink.accept(&snap)?;
            snapshots.push(snap);
        }
        sink.finish()?;

        info!(
            "session end: {} snapshot(s), {} rejected, {} stalled",
            snapshots.len(),
            stats.rejected,
            stats.stalled
        );
        Ok(SessionReport {
            snapshots,
            rounds_rejected: stats.rejected,
            rounds_stalled: stats.stalled,
            metrics: metrics::snapshot(),
        })
    }
}

fn run_initiator(
    manager: &SnapshotManager,
    cfg: &SimConfig,
    pids: &[Pid],
    stop: &AtomicBool,
    results: mpsc::Sender<GlobalSnapshot>,
) -> InitiatorStats {
    let mut rng = StdRng::seed_from_u64(cfg.seed.wrapping_add(1));
    let mut stats = InitiatorStats::default();
    let (lo, hi) = cfg.snapshot_interval;

    while !stop.load(Ordering::Relaxed) {
        if !sleep_unless_stopped(rng.gen_range(lo..=hi.max(lo)), stop) {
            break;
        }
        let Some(&starter) = pids.choose(&mut rng) else {
            break;
        };

        let round = match manager.initiate_snapshot(starter) {
            Ok(r) => r,
            Err(e) => {
                warn!("snapshot initiation by pid={} rejected: {:#}", starter, e);
                stats.rejected += 1;
                continue;
            }
        };

        sleep_unless_stopped(cfg.settle, stop);
        let done = manager
            .wait_for_quiescence(cfg.round_timeout, Some(stop))
            .and_then(|_| manager.complete_round());
        match done {
            Ok(snap) => {
                if results.send(snap).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("snapshot round {}: {:#}", round, e);
                manager.abandon_round();
                stats.stalled += 1;
            }
        }
    }
    stats
}

/// Sleep up to `d`, waking early when `stop` is raised.
/// Returns false if stopped.
fn sleep_unless_stopped(d: Duration, stop: &AtomicBool) -> bool {
    let deadline = Instant::now() + d;
    loop {
        if stop.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(POLL_STEP));
    }
}
