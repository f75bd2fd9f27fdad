use anyhow::{bail, Result};
use serde_json::json;
use std::path::PathBuf;

use crate::sink::{read_jsonl, summary_line};
use crate::snapshot::audit;

/// Re-check every snapshot in a JSONL file. Fails if any cut is inconsistent.
pub fn exec(file: PathBuf, json: bool) -> Result<()> {
    let snaps = read_jsonl(&file)?;

    let mut bad = 0usize;
    let mut rows = Vec::with_capacity(snaps.len());
    for s in &snaps {
        let violations = audit(s);
        if !violations.is_empty() {
            bad += 1;
        }
        if json {
            rows.push(json!({
                "round": s.round,
                "initiator": s.initiator,
                "violations": violations.iter().map(|v| v.to_string()).collect::<Vec<_>>(),
            }));
        } else {
            let verdict = if violations.is_empty() { "ok" } else { "INCONSISTENT" };
            println!("{:<12} {}", verdict, summary_line(s));
            for v in &violations {
                println!("    - {}", v);
            }
        }
    }

    if json {
        let doc = json!({ "file": file.display().to_string(), "snapshots": rows, "inconsistent": bad });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!("{} snapshot(s), {} inconsistent", snaps.len(), bad);
    }

    if bad > 0 {
        bail!("{} of {} snapshot(s) in {} are inconsistent", bad, snaps.len(), file.display());
    }
    Ok(())
}
