//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{ListCommand, RunCommand, TargetsCommand, ValidateCommand};
use std::ffi::OsString;

/// Exit status for configuration and usage errors
pub const EXIT_CONFIG_ERROR: i32 = 2;

/// Sequential CI pipeline runner for Rust projects
#[derive(Debug, Parser, Clone)]
#[command(name = "ci-runner")]
#[command(version)]
#[command(about = "Runs a fail-fast CI pipeline against a working tree", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress per-step progress lines
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate a pipeline configuration
    Validate(ValidateCommand),

    /// List a pipeline's steps in execution order
    List(ListCommand),

    /// List the example targets the toolchain reports
    Targets(TargetsCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
