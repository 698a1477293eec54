//! Subprocess toolchain - runs commands as child processes

use crate::core::{config::CommandSpec, WorkContext};
use crate::toolchain::{
    parse_example_names, CommandOutput, Invocation, ToolError, Toolchain, ToolchainConfig,
};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

/// Toolchain that spawns real processes with tokio
#[derive(Debug, Clone, Default)]
pub struct SubprocessToolchain {
    config: ToolchainConfig,
}

impl SubprocessToolchain {
    pub fn new(config: ToolchainConfig) -> Self {
        Self { config }
    }

    /// Program and arguments for a command
    fn argv(&self, command: &CommandSpec) -> Result<(String, Vec<String>), ToolError> {
        if command.is_empty() {
            return Err(ToolError::EmptyCommand);
        }
        match command {
            CommandSpec::Argv(argv) => Ok((argv[0].clone(), argv[1..].to_vec())),
            CommandSpec::Shell(expr) => Ok((
                self.config.shell.clone(),
                vec![self.config.shell_flag.clone(), expr.clone()],
            )),
        }
    }
}

#[async_trait]
impl Toolchain for SubprocessToolchain {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError> {
        let (program, args) = self.argv(&invocation.command)?;
        debug!(
            "Spawning `{}` in {}",
            invocation.command.display(),
            invocation.working_dir.display()
        );

        let mut command = Command::new(&program);
        command
            .args(&args)
            .current_dir(&invocation.working_dir)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let started = Instant::now();

        if invocation.capture {
            let output = command
                .output()
                .await
                .map_err(|source| spawn_error(&program, source))?;

            return Ok(CommandOutput {
                exit_code: exit_code_of(output.status),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration: started.elapsed(),
            });
        }

        if self.config.stdout_to_stderr {
            command.stdout(Stdio::from(std::io::stderr()));
        }

        let mut child = command
            .spawn()
            .map_err(|source| spawn_error(&program, source))?;
        let status = child.wait().await.map_err(|source| ToolError::Io {
            program: program.clone(),
            source,
        })?;

        Ok(CommandOutput {
            exit_code: exit_code_of(status),
            duration: started.elapsed(),
            ..Default::default()
        })
    }

    async fn enumerate_targets(&self, ctx: &WorkContext) -> Vec<String> {
        let listing = CommandSpec::Argv(vec![
            self.config.cargo.clone(),
            "run".to_string(),
            "--example".to_string(),
        ]);
        let invocation = Invocation::new(listing, ctx).captured();

        match self.execute(&invocation).await {
            Ok(output) => {
                let targets = parse_example_names(&output.combined());
                debug!("Enumerated {} targets in {}", targets.len(), ctx.working_dir.display());
                targets
            }
            Err(e) => {
                warn!("Could not enumerate targets: {}", e);
                Vec::new()
            }
        }
    }
}

fn spawn_error(program: &str, source: std::io::Error) -> ToolError {
    ToolError::Spawn {
        program: program.to_string(),
        source,
    }
}

/// Exit code of a finished process, 128+N for death by signal N
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}
