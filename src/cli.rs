use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::topology::Topology;

mod cmd_audit;
mod cmd_run;

fn parse_topology(s: &str) -> Result<Topology, String> {
    s.parse::<Topology>().map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(
    name = "snapnet",
    version,
    about = "Simulated process network with Chandy-Lamport global snapshots",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// Run a session: process threads + periodic snapshot rounds
    ///
    /// Unset flags fall back to SNAPNET_* env, then to defaults.
    /// Пример:
    ///   snapnet run --processes 5 --run-secs 15 --out snaps.jsonl --dot ./snapshots
    Run {
        #[arg(long)]
        processes: Option<usize>,
        /// ring | ring-skip | complete | explicit pairs "1-2,2-3"
        #[arg(long, value_parser = parse_topology, default_value = "ring-skip")]
        topology: Topology,
        #[arg(long)]
        run_secs: Option<u64>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        send_min_ms: Option<u64>,
        #[arg(long)]
        send_max_ms: Option<u64>,
        #[arg(long)]
        snapshot_min_ms: Option<u64>,
        #[arg(long)]
        snapshot_max_ms: Option<u64>,
        #[arg(long)]
        settle_ms: Option<u64>,
        #[arg(long)]
        round_timeout_ms: Option<u64>,
        /// Per-message logging (visible with RUST_LOG=debug)
        #[arg(long, default_value_t = false)]
        verbose: bool,
        /// Write snapshots as JSON Lines
        #[arg(long)]
        out: Option<PathBuf>,
        /// Write one Graphviz .dot file per snapshot into this directory
        #[arg(long)]
        dot: Option<PathBuf>,
        /// JSON output (single summary object)
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Check recorded snapshots (JSONL from `run --out`) for cut consistency
    Audit {
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Cmd::Run {
            processes,
            topology,
            run_secs,
            seed,
            send_min_ms,
            send_max_ms,
            snapshot_min_ms,
            snapshot_max_ms,
            settle_ms,
            round_timeout_ms,
            verbose,
            out,
            dot,
            json,
        } => {
            let overrides = cmd_run::Overrides {
                processes,
                run_secs,
                seed,
                send_min_ms,
                send_max_ms,
                snapshot_min_ms,
                snapshot_max_ms,
                settle_ms,
                round_timeout_ms,
                verbose,
            };
            cmd_run::exec(overrides, topology, out, dot, json)
        }
        Cmd::Audit { file, json } => cmd_audit::exec(file, json),
    }
}
