//! Command implementations
//!
//! This module contains implementations for all CLI subcommands.

pub mod doctor;
pub mod run;
pub mod shared;
pub mod start;
pub mod status;
pub mod stop;
