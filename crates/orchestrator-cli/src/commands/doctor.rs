//! Doctor command implementation
//!
//! Implements `orchestrator doctor`: a read-only diagnostic pass that
//! reports the detected platform tags (spec §4.A) and, when given a
//! recipe set, starts its targets, lets them settle, and surfaces any
//! `stuck` diagnostics (spec §4.G) plus the overall fleet health
//! (spec §6) — useful for a human checking why a fleet isn't converging.

use crate::commands::shared::{self, print_snapshot, snapshot};
use anyhow::Result;
use orchestrator_core::platform::TagTable;
use orchestrator_core::Scheduler;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Doctor command arguments
#[derive(clap::Args, Debug)]
pub struct DoctorArgs {
    /// Optional bootstrap recipe-set file; without it, only platform tag
    /// detection is reported.
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// How long to let the fleet settle before diagnosing (milliseconds)
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,
}

#[derive(Debug, Serialize)]
struct StuckRow {
    component: String,
    state: String,
    waiting_on: Vec<String>,
}

/// Execute the doctor command
#[instrument(skip(args))]
pub async fn execute_doctor(args: DoctorArgs) -> Result<()> {
    let tags = TagTable::detect();
    println!(
        "detected platform tags: {}",
        serde_json::to_string(&diagnose_tags(&tags))?
    );

    let Some(config) = args.config else {
        return Ok(());
    };

    let bootstrap = shared::load_bootstrap(&config)?;
    let root = config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let (registry, _sink) = shared::build_registry(bootstrap.source, root);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&registry)));

    let target_refs: Vec<&str> = bootstrap.targets.iter().map(String::as_str).collect();
    let components = scheduler.start(&target_refs).await;
    tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

    print_snapshot(&snapshot(&components))?;

    let overall = Scheduler::overall(&components);
    println!("overall: {overall:?}");

    let stuck: Vec<StuckRow> = scheduler
        .diagnose_stuck()
        .into_iter()
        .map(|r| StuckRow {
            component: r.component.to_string(),
            state: r.state.to_string(),
            waiting_on: r.waiting_on.iter().map(|id| id.to_string()).collect(),
        })
        .collect();
    if !stuck.is_empty() {
        println!("stuck: {}", serde_json::to_string_pretty(&stuck)?);
    }

    scheduler.stop_all().await;
    Ok(())
}

/// Every well-known tag name this crate detects, alongside its rank (`-1`
/// when the host doesn't carry it), for a stable doctor report.
fn diagnose_tags(tags: &TagTable) -> serde_json::Value {
    let known = [
        "all", "any", "posix", "linux", "debian", "windows", "ubuntu", "darwin", "raspbian",
        "qnx", "cygwin", "freebsd", "solaris",
    ];
    serde_json::Value::Object(
        known
            .iter()
            .map(|tag| (tag.to_string(), serde_json::json!(tags.rank(tag))))
            .collect(),
    )
}
