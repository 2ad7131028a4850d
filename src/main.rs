//! Thread Monitor - one-shot thread metrics snapshots from /proc.
//!
//! Captures live/daemon/peak/total-started thread counts plus optional
//! per-thread detail records and exports them as JSON.

mod exporter;
mod observer;
mod snapshot;
mod thread_info;

use anyhow::{Context, Result};
use clap::Parser;
use exporter::ViewExporter;
use observer::{ProcThreadObserver, ThreadObserver};
use snapshot::ThreadMetricsSnapshot;
use std::io;
use std::path::PathBuf;

/// Thread metrics snapshot tool: counts view and optional thread dump
#[derive(Parser, Debug)]
#[command(name = "threadmon")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Also export the details view (per-thread records with stacks)
    #[arg(short, long)]
    dump: bool,

    /// Maximum number of thread detail records to collect
    #[arg(short, long)]
    limit: Option<usize>,

    /// Write records to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the views to stdout instead of JSON lines
    #[arg(short, long)]
    pretty: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut observer = ProcThreadObserver::new()
        .with_details(args.dump)
        .with_stacks(args.dump)
        .with_detail_limit(args.limit);
    let snapshot = observer.observe().context("Failed to observe threads")?;

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&snapshot.counts_view())?);
        if args.dump {
            println!("{}", serde_json::to_string_pretty(&snapshot.details_view())?);
        }
        return Ok(());
    }

    match args.output {
        Some(path) => {
            let mut exporter = ViewExporter::create(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            export_views(&mut exporter, &snapshot, args.dump)
        }
        None => {
            let stdout = io::stdout();
            let mut exporter = ViewExporter::new(stdout.lock());
            export_views(&mut exporter, &snapshot, args.dump)
        }
    }
}

fn export_views<W: io::Write>(
    exporter: &mut ViewExporter<W>,
    snapshot: &ThreadMetricsSnapshot,
    dump: bool,
) -> Result<()> {
    exporter.export_counts(snapshot)?;
    if dump {
        exporter.export_details(snapshot)?;
    }
    exporter.flush()
}
