//! Status command implementation
//!
//! Implements the `orchestrator status` subcommand: a one-shot health
//! check that resolves a bootstrap recipe set, starts every declared
//! target, gives the fleet a short settle window, reports the resulting
//! state of every component, and stops everything again before exiting.

use crate::commands::shared::{self, print_snapshot, snapshot};
use anyhow::Result;
use orchestrator_core::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Status command arguments
#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Path to a bootstrap recipe-set file (TOML or JSON)
    #[arg(long, short)]
    pub config: PathBuf,

    /// How long to let the fleet settle before reporting (milliseconds)
    #[arg(long, default_value_t = 500)]
    pub settle_ms: u64,
}

/// Execute the status command
#[instrument(skip(args))]
pub async fn execute_status(args: StatusArgs) -> Result<()> {
    let bootstrap = shared::load_bootstrap(&args.config)?;
    let root = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let (registry, _sink) = shared::build_registry(bootstrap.source, root);
    let scheduler = Scheduler::new(Arc::clone(&registry));

    let target_refs: Vec<&str> = bootstrap.targets.iter().map(String::as_str).collect();
    let components = scheduler.start(&target_refs).await;
    tokio::time::sleep(Duration::from_millis(args.settle_ms)).await;

    print_snapshot(&snapshot(&components))?;

    let stuck = scheduler.diagnose_stuck();
    for report in &stuck {
        tracing::warn!(
            component = %report.component,
            state = %report.state,
            waiting_on = ?report.waiting_on,
            "component stalled"
        );
    }

    scheduler.stop_all().await;
    Ok(())
}
