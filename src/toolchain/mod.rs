//! Toolchain seam - everything that leaves the process goes through here

pub mod config;
pub mod subprocess;
pub mod targets;

use crate::core::{config::CommandSpec, WorkContext};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use config::ToolchainConfig;
pub use subprocess::SubprocessToolchain;
pub use targets::parse_example_names;

/// Exit code for a program that cannot be found or started
pub const EXIT_SPAWN_FAILED: i32 = 127;

/// Exit code for a program that exists but may not be executed
pub const EXIT_NOT_EXECUTABLE: i32 = 126;

/// Errors raised before a command produces an exit status
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("empty command")]
    EmptyCommand,
}

impl ToolError {
    /// Exit code a shell would report for the same failure
    pub fn exit_code(&self) -> i32 {
        match self {
            ToolError::Spawn { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                EXIT_NOT_EXECUTABLE
            }
            ToolError::Spawn { .. } | ToolError::EmptyCommand => EXIT_SPAWN_FAILED,
            ToolError::Io { .. } => 1,
        }
    }
}

/// A fully resolved command ready to be started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// What to run
    pub command: CommandSpec,

    /// Directory the command runs in
    pub working_dir: PathBuf,

    /// Variables layered over the inherited environment
    pub env: BTreeMap<String, String>,

    /// Capture stdout and stderr instead of streaming them
    pub capture: bool,
}

impl Invocation {
    /// Invocation of `command` in the context's directory and environment
    pub fn new(command: CommandSpec, ctx: &WorkContext) -> Self {
        Self {
            command,
            working_dir: ctx.working_dir.clone(),
            env: ctx.env_overlay.clone(),
            capture: false,
        }
    }

    pub fn captured(mut self) -> Self {
        self.capture = true;
        self
    }
}

/// What a finished command left behind
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,

    /// Empty unless the invocation captured output
    pub stdout: String,
    pub stderr: String,

    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Stdout followed by stderr
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// Runs external commands on behalf of steps
///
/// The engine never spawns processes itself, so tests can substitute a
/// recording implementation.
#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Run a command to completion
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError>;

    /// Names of the example binaries available in the context's project
    ///
    /// Any failure yields an empty list.
    async fn enumerate_targets(&self, _ctx: &WorkContext) -> Vec<String> {
        Vec::new()
    }
}
