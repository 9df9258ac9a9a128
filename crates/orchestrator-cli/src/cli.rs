//! Top-level command-line surface, mirroring the teacher crate's
//! `clap`-derive `Cli`/`dispatch` shape.

use crate::commands::doctor::{execute_doctor, DoctorArgs};
use crate::commands::run::{execute_run, RunArgs};
use crate::commands::start::{execute_start, StartArgs};
use crate::commands::status::{execute_status, StatusArgs};
use crate::commands::stop::{execute_stop, StopArgs};
use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = env!("CARGO_PKG_NAME"),
    version,
    about = "Local component orchestrator: resolves dependencies, drives lifecycles, and reports fleet status"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start every declared target and keep the fleet running until interrupted
    Run(RunArgs),
    /// Start a single named component (and its transitive dependencies)
    Start(StartArgs),
    /// Stop a single named component (and whatever was started alongside it)
    Stop(StopArgs),
    /// Report the current state of every component in a recipe set
    Status(StatusArgs),
    /// Report detected platform tags and, optionally, stuck dependencies
    Doctor(DoctorArgs),
}

impl Cli {
    pub async fn dispatch(self) -> Result<()> {
        match self.command {
            Command::Run(args) => execute_run(args).await,
            Command::Start(args) => execute_start(args).await,
            Command::Stop(args) => execute_stop(args).await,
            Command::Status(args) => execute_status(args).await,
            Command::Doctor(args) => execute_doctor(args).await,
        }
    }
}
