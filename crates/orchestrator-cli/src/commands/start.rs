//! Start command implementation
//!
//! Implements `orchestrator start <name>`: a one-shot invocation that
//! resolves a bootstrap recipe set, starts a single named component (and
//! whatever it transitively depends on, per spec §4.G resolution), reports
//! its resulting state, and leaves the process.

use crate::commands::shared::{self, print_snapshot, snapshot};
use anyhow::Result;
use orchestrator_core::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

/// Start command arguments
#[derive(clap::Args, Debug)]
pub struct StartArgs {
    /// Path to a bootstrap recipe-set file (TOML or JSON)
    #[arg(long, short)]
    pub config: PathBuf,

    /// Name of the component to start
    pub name: String,
}

/// Execute the start command
#[instrument(skip(args))]
pub async fn execute_start(args: StartArgs) -> Result<()> {
    let bootstrap = shared::load_bootstrap(&args.config)?;
    let root = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let (registry, _sink) = shared::build_registry(bootstrap.source, root);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&registry)));

    info!(name = %args.name, "starting component");
    let components = scheduler.start(&[args.name.as_str()]).await;
    print_snapshot(&snapshot(&components))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_args_take_a_single_component_name() {
        let args = StartArgs {
            config: PathBuf::from("fleet.toml"),
            name: "web".to_string(),
        };
        assert_eq!(args.name, "web");
    }
}
