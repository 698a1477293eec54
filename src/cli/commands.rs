//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to pipeline YAML file (default: ci-runner.yaml in DIR, else the builtin pipeline)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Working tree to run in (default: current directory)
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Environment overrides (KEY=VALUE)
    #[arg(long, value_parser = parse_key_value, value_name = "KEY=VALUE")]
    pub env: Vec<(String, String)>,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value, value_name = "KEY=VALUE")]
    pub var: Vec<(String, String)>,

    /// Print the run result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate a pipeline configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Directory searched for ci-runner.yaml
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List a pipeline's steps
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Path to pipeline YAML file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Working tree the step toggles are evaluated against
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// List example targets
#[derive(Debug, Args, Clone)]
pub struct TargetsCommand {
    /// Project directory
    #[arg(short = 'C', long = "dir", value_name = "DIR")]
    pub dir: Option<PathBuf>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
