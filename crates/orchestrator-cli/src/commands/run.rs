//! Run command implementation
//!
//! Implements the `orchestrator run` subcommand: resolve a bootstrap
//! recipe set, start every declared target in dependency order, and keep
//! the fleet running until interrupted, at which point every target is
//! stopped in reverse order before the process exits.

use crate::commands::shared::{self, print_snapshot, snapshot};
use anyhow::Result;
use orchestrator_core::Scheduler;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};

/// Run command arguments
#[derive(clap::Args, Debug)]
pub struct RunArgs {
    /// Path to a bootstrap recipe-set file (TOML or JSON)
    #[arg(long, short)]
    pub config: PathBuf,

    /// Exit automatically once every target reaches Running/Finished,
    /// instead of waiting for Ctrl-C. Useful for smoke tests.
    #[arg(long)]
    pub until_healthy: bool,

    /// Give up waiting for health after this many seconds (with `--until-healthy`)
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,
}

/// Execute the run command
#[instrument(skip(args))]
pub async fn execute_run(args: RunArgs) -> Result<()> {
    let bootstrap = shared::load_bootstrap(&args.config)?;
    let root = args
        .config
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));

    let (registry, _sink) = shared::build_registry(bootstrap.source, root);
    let scheduler = Arc::new(Scheduler::new(Arc::clone(&registry)));

    let target_refs: Vec<&str> = bootstrap.targets.iter().map(String::as_str).collect();
    info!(targets = ?target_refs, "starting fleet");
    let components = scheduler.start(&target_refs).await;

    if args.until_healthy {
        wait_until_healthy(&components, Duration::from_secs(args.timeout_secs)).await?;
    } else {
        tokio::signal::ctrl_c().await?;
        info!("received interrupt, stopping fleet");
    }

    print_snapshot(&snapshot(&components))?;
    scheduler.stop_all().await;
    Ok(())
}

async fn wait_until_healthy(
    components: &[orchestrator_core::Component],
    timeout: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if matches!(Scheduler::overall(components), orchestrator_core::Overall::Healthy) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("timed out waiting for the fleet to become healthy");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_args_accept_a_config_path() {
        let args = RunArgs {
            config: PathBuf::from("fleet.toml"),
            until_healthy: true,
            timeout_secs: 5,
        };
        assert!(args.until_healthy);
        assert_eq!(args.timeout_secs, 5);
    }
}
