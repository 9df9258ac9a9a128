use anyhow::Result;
use clap::Parser;
use orchestrator_core::OrchestratorError;

mod cli;
mod commands;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let parsed = cli::Cli::parse();

    if let Err(error) = parsed.dispatch().await {
        tracing::error!(error = %error, "command failed");
        std::process::exit(exit_code_for(&error));
    }

    Ok(())
}

/// Map a failed command into the process exit codes named in spec §6: `0`
/// clean shutdown, `1` unrecoverable configuration error, `2` dependency
/// resolution failure at startup.
fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<OrchestratorError>() {
        Some(OrchestratorError::Resolution { .. })
        | Some(OrchestratorError::DependencySyntax { .. })
        | Some(OrchestratorError::Cycle { .. }) => 2,
        _ => 1,
    }
}
