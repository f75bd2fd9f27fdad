use anyhow::Result;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SimConfig;
use crate::sim::Simulation;
use crate::sink::{summary_line, DotSink, Fanout, JsonlSink, LogSink};
use crate::snapshot::audit;
use crate::topology::Topology;
use crate::traffic::RandomPeer;

/// CLI flags that override env/default configuration.
#[derive(Debug, Default)]
pub struct Overrides {
    pub processes: Option<usize>,
    pub run_secs: Option<u64>,
    pub seed: Option<u64>,
    pub send_min_ms: Option<u64>,
    pub send_max_ms: Option<u64>,
    pub snapshot_min_ms: Option<u64>,
    pub snapshot_max_ms: Option<u64>,
    pub settle_ms: Option<u64>,
    pub round_timeout_ms: Option<u64>,
    pub verbose: bool,
}

impl Overrides {
    fn apply(&self, mut cfg: SimConfig) -> SimConfig {
        let ms = Duration::from_millis;
        if let Some(n) = self.processes {
            cfg.processes = n;
        }
        if let Some(s) = self.run_secs {
            cfg.run_duration = Duration::from_secs(s);
        }
        if let Some(s) = self.seed {
            cfg.seed = s;
        }
        if let Some(v) = self.send_min_ms {
            cfg.send_interval.0 = ms(v);
        }
        if let Some(v) = self.send_max_ms {
            cfg.send_interval.1 = ms(v);
        }
        if let Some(v) = self.snapshot_min_ms {
            cfg.snapshot_interval.0 = ms(v);
        }
        if let Some(v) = self.snapshot_max_ms {
            cfg.snapshot_interval.1 = ms(v);
        }
        if let Some(v) = self.settle_ms {
            cfg.settle = ms(v);
        }
        if let Some(v) = self.round_timeout_ms {
            cfg.round_timeout = ms(v);
        }
        if self.verbose {
            cfg.verbose = true;
        }
        cfg
    }
}

pub fn exec(
    overrides: Overrides,
    topology: Topology,
    out: Option<PathBuf>,
    dot: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let cfg = overrides.apply(SimConfig::from_env());
    let sim = Simulation::new(cfg, &topology)?;

    let mut sink = Fanout::new();
    if !json {
        sink.push(Box::new(LogSink));
    }
    if let Some(path) = &out {
        sink.push(Box::new(JsonlSink::create(path)?));
    }
    if let Some(dir) = &dot {
        sink.push(Box::new(DotSink::create(dir)?));
    }

    let report = sim.run(Arc::new(RandomPeer), &mut sink)?;
    let inconsistent = report.snapshots.iter().filter(|s| !audit(s).is_empty()).count();

    if json {
        let snaps: Vec<_> = report
            .snapshots
            .iter()
            .map(|s| {
                json!({
                    "round": s.round,
                    "initiator": s.initiator,
                    "total_state": s.total_state(),
                    "in_flight": s.in_flight_count(),
                    "consistent": audit(s).is_empty(),
                })
            })
            .collect();
        let doc = json!({
            "processes": sim.processes().len(),
            "topology": topology.to_string(),
            "snapshots": snaps,
            "rounds_rejected": report.rounds_rejected,
            "rounds_stalled": report.rounds_stalled,
            "inconsistent": inconsistent,
            "metrics": report.metrics,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    if report.snapshots.is_empty() {
        println!("No snapshots were taken.");
        return Ok(());
    }
    for (i, s) in report.snapshots.iter().enumerate() {
        println!("#{:<3} {}", i + 1, summary_line(s));
    }
    println!(
        "snapshots={} rejected={} stalled={} inconsistent={}",
        report.snapshots.len(),
        report.rounds_rejected,
        report.rounds_stalled,
        inconsistent
    );
    if let Some(path) = out {
        println!("jsonl: {}", path.display());
    }
    if let Some(dir) = dot {
        println!("dot:   {}", dir.display());
    }
    Ok(())
}
