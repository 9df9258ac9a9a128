//! Stop command implementation
//!
//! Implements `orchestrator stop <name>`: resolves a bootstrap recipe
//! set, issues a `close` request against the named component (and every
//! other target previously brought up alongside it), and reports the
//! resulting state before the process exits.

use crate::commands::shared::{self, print_snapshot, snapshot};
use anyhow::Result;
use orchestrator_core::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// Stop command arguments
#[derive(clap::Args, Debug)]
pub struct StopArgs {
    /// Path to a bootstrap recipe-set file (TOML or JSON)
    #[arg(long, short)]
    pub config: PathBuf,

    /// Name of the component to stop
    pub name: String,
}

/// Execute the stop command
#[instrument(skip(args))]
pub async fn execute_stop(args: StopArgs) -> Result<()> {
    let bootstrap = shared::load_bootstrap(&args.config)?;
    let root = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let (registry, _sink) = shared::build_registry(bootstrap.source, root);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&registry)));

    info!(name = %args.name, "stopping component");
    scheduler.start(&[args.name.as_str()]).await;
    scheduler.stop_all().await;

    let component = registry.locate(&args.name);
    print_snapshot(&snapshot(std::slice::from_ref(&component)))?;
    Ok(())
}
