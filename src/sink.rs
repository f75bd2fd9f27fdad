//! Result sinks for completed global snapshots.
//!
//! - LogSink: one summary line per snapshot via `log`.
//! - JsonlSink: one JSON object per line (re-readable with `read_jsonl`).
//! - DotSink: one Graphviz file per snapshot (nodes = pid/state, edges =
//!   recorded in-flight messages).
//! - MemorySink: keeps everything in memory.
//! - Fanout: forwards to several sinks.

use anyhow::{Context, Result};
use log::info;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::snapshot::GlobalSnapshot;

pub trait SnapshotSink {
    fn accept(&mut self, snap: &GlobalSnapshot) -> Result<()>;

    /// Flush buffered output at the end of a session.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogSink;

impl SnapshotSink for LogSink {
    fn accept(&mut self, snap: &GlobalSnapshot) -> Result<()> {
        info!("{}", summary_line(snap));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemorySink {
    pub snapshots: Vec<GlobalSnapshot>,
}

impl SnapshotSink for MemorySink {
    fn accept(&mut self, snap: &GlobalSnapshot) -> Result<()> {
        self.snapshots.push(snap.clone());
        Ok(())
    }
}

/// JSON Lines file, one GlobalSnapshot per line.
pub struct JsonlSink {
    path: PathBuf,
    out: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            out: BufWriter::new(f),
        })
    }
}

impl SnapshotSink for JsonlSink {
    fn accept(&mut self, snap: &GlobalSnapshot) -> Result<()> {
        serde_json::to_writer(&mut self.out, snap)
            .with_context(|| format!("serialize round {} to {}", snap.round, self.path.display()))?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out
            .flush()
            .with_context(|| format!("flush {}", self.path.display()))
    }
}

/// Read back a file written by JsonlSink. Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> Result<Vec<GlobalSnapshot>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    for (i, line) in BufReader::new(f).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let snap: GlobalSnapshot = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: malformed snapshot", path.display(), i + 1))?;
        out.push(snap);
    }
    Ok(out)
}

/// Writes `<dir>/Snapshot_#<n>_(Initiated_by_PID=<pid>).dot` per snapshot.
pub struct DotSink {
    dir: PathBuf,
    count: usize,
}

impl DotSink {
    /// Creates `dir`; stale `.dot` files from a previous session are removed.
    pub fn create(dir: &Path) -> Result<Self> {
        if dir.exists() {
            for entry in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
                let p = entry?.path();
                if p.extension().map_or(false, |e| e == "dot") {
                    fs::remove_file(&p).with_context(|| format!("remove {}", p.display()))?;
                }
            }
        } else {
            fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            count: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.count
    }
}

impl SnapshotSink for DotSink {
    fn accept(&mut self, snap: &GlobalSnapshot) -> Result<()> {
        self.count += 1;
        let title = format!("Snapshot #{} (Initiated by PID={})", self.count, snap.initiator);
        let path = self.dir.join(format!("{}.dot", title.replace(' ', "_")));
        fs::write(&path, render_dot(&title, snap))
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

/// Forward every snapshot to each inner sink in order.
#[derive(Default)]
pub struct Fanout {
    sinks: Vec<Box<dyn SnapshotSink>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn SnapshotSink>) {
        self.sinks.push(sink);
    }
}

impl SnapshotSink for Fanout {
    fn accept(&mut self, snap: &GlobalSnapshot) -> Result<()> {
        for s in &mut self.sinks {
            s.accept(snap)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        for s in &mut self.sinks {
            s.finish()?;
        }
        Ok(())
    }
}

/// One-line human summary of a snapshot.
pub fn summary_line(snap: &GlobalSnapshot) -> String {
    let states: Vec<String> = snap
        .processes
        .values()
        .map(|r| format!("{}={}", r.pid, r.state))
        .collect();
    format!(
        "round {} (initiator {}): states [{}], total {}, in flight {}",
        snap.round,
        snap.initiator,
        states.join(" "),
        snap.total_state(),
        snap.in_flight_count()
    )
}

/// Graphviz rendering: circular layout, node label `PID=<pid>\nState=<s>`,
/// edge `from -> to` labelled with the recorded messages joined by commas.
pub fn render_dot(title: &str, snap: &GlobalSnapshot) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "digraph snapshot {{");
    let _ = writeln!(s, "  layout=circo;");
    let _ = writeln!(s, "  label=\"{}\";", escape(title));
    let _ = writeln!(s, "  node [shape=circle, style=filled, fillcolor=skyblue, fontsize=9];");
    for r in snap.processes.values() {
        let _ = writeln!(s, "  {} [label=\"PID={}\\nState={}\"];", r.pid, r.pid, r.state);
    }
    for (from, to) in snap.edges() {
        let label = snap
            .channel(from, to)
            .map(|msgs| msgs.join(","))
            .unwrap_or_default();
        let _ = writeln!(s, "  {} -> {} [label=\"{}\", fontcolor=red];", from, to, escape(&label));
    }
    s.push_str("}\n");
    s
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
