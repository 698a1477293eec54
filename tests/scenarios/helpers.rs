//! Test utility functions for ci-runner scenarios

use async_trait::async_trait;
use ci_runner::core::{Pipeline, RunResult, RunStatus, StepState, WorkContext};
use ci_runner::execution::ExecutionEngine;
use ci_runner::toolchain::{CommandOutput, Invocation, ToolError, Toolchain};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// One recorded command invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub command: String,
    pub working_dir: PathBuf,
    pub env: BTreeMap<String, String>,
}

/// Toolchain that records every invocation instead of spawning anything
///
/// Exit codes are scripted by substring: the first rule whose needle occurs
/// in the command line decides the exit code, everything else exits 0.
#[derive(Clone, Default)]
pub struct MockToolchain {
    calls: Arc<Mutex<Vec<Call>>>,
    rules: Vec<(String, i32)>,
    missing: Vec<String>,
    targets: Vec<String>,
}

impl MockToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `needle` exit with `code`
    pub fn exit_with(mut self, needle: &str, code: i32) -> Self {
        self.rules.push((needle.to_string(), code));
        self
    }

    /// Commands starting with `program` cannot be spawned
    pub fn missing_program(mut self, program: &str) -> Self {
        self.missing.push(program.to_string());
        self
    }

    pub fn with_targets(mut self, targets: &[&str]) -> Self {
        self.targets = targets.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines in invocation order
    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.command).collect()
    }
}

#[async_trait]
impl Toolchain for MockToolchain {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput, ToolError> {
        let command = invocation.command.display();
        self.calls.lock().unwrap().push(Call {
            command: command.clone(),
            working_dir: invocation.working_dir.clone(),
            env: invocation.env.clone(),
        });

        if let Some(program) = self.missing.iter().find(|p| command.starts_with(p.as_str())) {
            return Err(ToolError::Spawn {
                program: program.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let exit_code = self
            .rules
            .iter()
            .find(|(needle, _)| command.contains(needle.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);

        Ok(CommandOutput {
            exit_code,
            ..Default::default()
        })
    }

    async fn enumerate_targets(&self, _ctx: &WorkContext) -> Vec<String> {
        self.targets.clone()
    }
}

/// Run `pipeline` in `dir` with `toolchain`, keeping a handle on the recorder
pub async fn run_with_mock(pipeline: &Pipeline, dir: &Path, toolchain: &MockToolchain) -> RunResult {
    let engine = ExecutionEngine::new(toolchain.clone());
    engine.run(pipeline, &WorkContext::new(dir)).await
}

pub fn assert_run_succeeded(result: &RunResult) {
    assert!(
        result.is_success(),
        "Expected success, got {:?}",
        result.status
    );
    assert_eq!(result.exit_code(), 0);
}

pub fn assert_failed_at(result: &RunResult, name: &str, exit_code: i32) {
    match &result.status {
        RunStatus::FailedAtStep {
            name: failed,
            exit_code: code,
            ..
        } => {
            assert_eq!(failed, name, "Run failed at the wrong step");
            assert_eq!(*code, exit_code, "Unexpected exit code");
        }
        RunStatus::Success => panic!("Expected failure at {}, run succeeded", name),
    }
    assert_eq!(result.exit_code(), exit_code);
}

pub fn assert_step_tolerated(result: &RunResult, name: &str, exit_code: i32) {
    match result.step(name).map(|s| &s.state) {
        Some(StepState::Tolerated { exit_code: code, .. }) => assert_eq!(*code, exit_code),
        other => panic!("Expected {} to be tolerated, got {:?}", name, other),
    }
}

pub fn assert_step_skipped(result: &RunResult, name: &str) {
    match result.step(name).map(|s| &s.state) {
        Some(StepState::Skipped { .. }) => {}
        other => panic!("Expected {} to be skipped, got {:?}", name, other),
    }
}
