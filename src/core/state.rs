//! Execution state models

use crate::markers::MarkerMatch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// State of a single step within a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step exited zero
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited non-zero but is allowed to
    Tolerated {
        exit_code: i32,
        error: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step exited non-zero and stopped the run
    Failed {
        exit_code: i32,
        error: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step was not run
    Skipped { reason: String },
}

impl StepState {
    /// Exit code of a step that ran and failed
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StepState::Completed { .. } => Some(0),
            StepState::Tolerated { exit_code, .. } | StepState::Failed { exit_code, .. } => {
                Some(*exit_code)
            }
            StepState::Skipped { .. } => None,
        }
    }

    /// Whether the step's command was actually invoked
    pub fn was_executed(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Tolerated { .. } | StepState::Failed { .. }
        )
    }
}

/// Record of one visited step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    /// Position in declaration order
    pub index: usize,

    /// Step name
    pub name: String,

    /// Final state
    pub state: StepState,

    /// Marker occurrences found by marker steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<MarkerMatch>,

    /// Targets visited by a for-each-target step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,

    /// Nested runs started by a fixtures step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fixtures: Vec<RunResult>,
}

impl StepRecord {
    pub fn new(index: usize, name: impl Into<String>, state: StepState) -> Self {
        Self {
            index,
            name: name.into(),
            state,
            markers: Vec::new(),
            targets: Vec::new(),
            fixtures: Vec::new(),
        }
    }
}

/// Terminal verdict of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step passed, was tolerated, or was skipped
    Success,
    /// The named step failed and nothing after it ran
    FailedAtStep {
        name: String,
        index: usize,
        exit_code: i32,
    },
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }

    /// Process exit status for this verdict
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            // A failed run never exits 0
            RunStatus::FailedAtStep { exit_code, .. } if *exit_code == 0 => 1,
            RunStatus::FailedAtStep { exit_code, .. } => *exit_code,
        }
    }
}

/// A run in progress
///
/// Only ever advanced by appending the record of the step the cursor just
/// passed; finishing consumes it into a [`RunResult`].
#[derive(Debug, Clone)]
pub struct Run {
    execution_id: Uuid,
    pipeline_name: String,
    working_dir: PathBuf,
    started_at: DateTime<Utc>,
    total_steps: usize,
    records: Vec<StepRecord>,
}

impl Run {
    pub fn new(pipeline_name: impl Into<String>, working_dir: &Path, total_steps: usize) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            working_dir: working_dir.to_path_buf(),
            started_at: Utc::now(),
            total_steps,
            records: Vec::with_capacity(total_steps),
        }
    }

    pub fn execution_id(&self) -> Uuid {
        self.execution_id
    }

    /// Append the record of a visited step
    pub fn record(&mut self, record: StepRecord) {
        self.records.push(record);
    }

    /// Close the run with its verdict
    pub fn finish(self, status: RunStatus) -> RunResult {
        let completed_at = Utc::now();

        RunResult {
            execution_id: self.execution_id,
            pipeline_name: self.pipeline_name,
            working_dir: self.working_dir,
            status,
            total_steps: self.total_steps,
            steps: self.records,
            started_at: self.started_at,
            completed_at,
        }
    }
}

/// Reported outcome of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub execution_id: Uuid,
    pub pipeline_name: String,
    pub working_dir: PathBuf,
    pub status: RunStatus,
    pub total_steps: usize,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Record of a step by name
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Names of steps whose commands actually ran, in order
    pub fn executed_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.state.was_executed())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Names of skipped steps, in order
    pub fn skipped_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Skipped { .. }))
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Names of steps that failed but were tolerated
    pub fn tolerated_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Tolerated { .. }))
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.completed_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
