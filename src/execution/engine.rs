//! Main execution engine - orchestrates a pipeline run

use crate::{
    core::{
        FixtureSpec, Pipeline, Run, RunResult, RunStatus, Step, StepAction, StepRecord, StepState,
        WorkContext,
    },
    execution::{StepCursor, StepExecutor, StepOutcome, StepReport},
    markers::MarkerMatch,
    toolchain::Toolchain,
};
use chrono::Utc;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Name of the step that runs a fixture's own command inside a nested run
pub const FIXTURE_STEP_NAME: &str = "run-fixture";

/// Exit status of a fixtures step whose directory cannot be listed
pub const EXIT_FIXTURES_UNREADABLE: i32 = 1;

/// Events that can occur during a run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted {
        execution_id: Uuid,
        pipeline_name: String,
        working_dir: PathBuf,
        total_steps: usize,
        depth: usize,
    },
    StepStarted {
        index: usize,
        total: usize,
        name: String,
        summary: String,
        depth: usize,
    },
    StepSkipped {
        index: usize,
        name: String,
        reason: String,
        depth: usize,
    },
    StepCompleted {
        index: usize,
        name: String,
        duration: Duration,
        depth: usize,
    },
    StepTolerated {
        index: usize,
        name: String,
        exit_code: i32,
        error: String,
        depth: usize,
    },
    StepFailed {
        index: usize,
        name: String,
        exit_code: i32,
        error: String,
        depth: usize,
    },
    MarkerMatches {
        name: String,
        marker: String,
        matches: Vec<MarkerMatch>,
        fatal: bool,
        depth: usize,
    },
    FixtureEntered {
        path: PathBuf,
        depth: usize,
    },
    RunCompleted {
        execution_id: Uuid,
        pipeline_name: String,
        status: RunStatus,
        depth: usize,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(&ExecutionEvent) + Send + Sync>;

/// Boxed future of a run; runs nest through fixture steps
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = RunResult> + Send + 'a>>;

/// Main pipeline execution engine
pub struct ExecutionEngine<T> {
    executor: StepExecutor<T>,
    event_handlers: Vec<EventHandler>,
}

impl<T: Toolchain> ExecutionEngine<T> {
    pub fn new(toolchain: T) -> Self {
        Self {
            executor: StepExecutor::new(toolchain),
            event_handlers: Vec::new(),
        }
    }

    pub fn toolchain(&self) -> &T {
        self.executor.toolchain()
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Run `pipeline` in `ctx`
    ///
    /// Steps run in declaration order. The first failure that is not
    /// tolerated ends the run and nothing after it is invoked.
    pub fn run<'a>(&'a self, pipeline: &'a Pipeline, ctx: &'a WorkContext) -> RunFuture<'a> {
        Box::pin(async move {
            let ctx = ctx.layered(&pipeline.env, &pipeline.variables);
            let total = pipeline.len();
            let mut run = Run::new(&pipeline.name, &ctx.working_dir, total);
            let mut cursor = StepCursor::new(total);

            info!(
                "Starting run of {} in {} ({})",
                pipeline.name,
                ctx.working_dir.display(),
                run.execution_id()
            );
            self.emit_event(ExecutionEvent::RunStarted {
                execution_id: run.execution_id(),
                pipeline_name: pipeline.name.clone(),
                working_dir: ctx.working_dir.clone(),
                total_steps: total,
                depth: ctx.depth,
            });

            let mut status = RunStatus::Success;

            while let Some(index) = cursor.next() {
                let step = &pipeline.steps[index];
                let record = self.run_step(pipeline, step, index, &ctx).await;

                if let StepState::Failed { exit_code, .. } = &record.state {
                    status = RunStatus::FailedAtStep {
                        name: step.name.clone(),
                        index,
                        exit_code: *exit_code,
                    };
                    cursor.halt();
                }
                run.record(record);
            }

            match &status {
                RunStatus::Success => info!("Run of {} succeeded", pipeline.name),
                RunStatus::FailedAtStep {
                    name, exit_code, ..
                } => error!(
                    step = %name,
                    exit_code,
                    "Run of {} failed",
                    pipeline.name
                ),
            }

            self.emit_event(ExecutionEvent::RunCompleted {
                execution_id: run.execution_id(),
                pipeline_name: pipeline.name.clone(),
                status: status.clone(),
                depth: ctx.depth,
            });

            run.finish(status)
        })
    }

    /// Run one step and return its record
    async fn run_step(
        &self,
        pipeline: &Pipeline,
        step: &Step,
        index: usize,
        ctx: &WorkContext,
    ) -> StepRecord {
        let depth = ctx.depth;
        let step_ctx = ctx.with_step_env(&step.env);

        if let Some(reason) = step.skip_reason(&step_ctx) {
            debug!(step = %step.name, "Skipping step: {}", reason);
            self.emit_event(ExecutionEvent::StepSkipped {
                index,
                name: step.name.clone(),
                reason: reason.clone(),
                depth,
            });
            return StepRecord::new(index, &step.name, StepState::Skipped { reason });
        }

        self.emit_event(ExecutionEvent::StepStarted {
            index,
            total: pipeline.len(),
            name: step.name.clone(),
            summary: step.summary(),
            depth,
        });

        let started_at = Utc::now();
        let report = match &step.action {
            StepAction::Fixtures(spec) => self.run_fixtures(pipeline, spec, &step_ctx).await,
            _ => self.executor.execute(step, &step_ctx).await,
        };
        let finished_at = Utc::now();

        if !report.markers.is_empty() {
            if let StepAction::ForbidMarker(search) | StepAction::ReportMarker(search) =
                &step.action
            {
                self.emit_event(ExecutionEvent::MarkerMatches {
                    name: step.name.clone(),
                    marker: search.pattern.display(),
                    matches: report.markers.clone(),
                    fatal: matches!(step.action, StepAction::ForbidMarker(_)),
                    depth,
                });
            }
        }

        let StepReport {
            outcome,
            markers,
            targets,
            fixtures,
        } = report;

        let state = match outcome {
            StepOutcome::Passed => {
                info!(step = %step.name, "Step passed");
                self.emit_event(ExecutionEvent::StepCompleted {
                    index,
                    name: step.name.clone(),
                    duration: (finished_at - started_at).to_std().unwrap_or_default(),
                    depth,
                });
                StepState::Completed {
                    started_at,
                    completed_at: finished_at,
                }
            }
            StepOutcome::Skipped { reason } => {
                debug!(step = %step.name, "Step had nothing to do: {}", reason);
                self.emit_event(ExecutionEvent::StepSkipped {
                    index,
                    name: step.name.clone(),
                    reason: reason.clone(),
                    depth,
                });
                StepState::Skipped { reason }
            }
            StepOutcome::Failed { exit_code, error } if step.tolerates_failure() => {
                warn!(step = %step.name, exit_code, "Tolerating failure: {}", error);
                self.emit_event(ExecutionEvent::StepTolerated {
                    index,
                    name: step.name.clone(),
                    exit_code,
                    error: error.clone(),
                    depth,
                });
                StepState::Tolerated {
                    exit_code,
                    error,
                    started_at,
                    completed_at: finished_at,
                }
            }
            StepOutcome::Failed { exit_code, error } => {
                error!(step = %step.name, exit_code, "Step failed: {}", error);
                self.emit_event(ExecutionEvent::StepFailed {
                    index,
                    name: step.name.clone(),
                    exit_code,
                    error: error.clone(),
                    depth,
                });
                StepState::Failed {
                    exit_code,
                    error,
                    started_at,
                    failed_at: finished_at,
                }
            }
        };

        StepRecord {
            index,
            name: step.name.clone(),
            state,
            markers,
            targets,
            fixtures,
        }
    }

    /// Fixture step: a missing directory means there is nothing to do
    async fn run_fixtures(
        &self,
        pipeline: &Pipeline,
        spec: &FixtureSpec,
        ctx: &WorkContext,
    ) -> StepReport {
        let root = ctx.resolve(&spec.dir);
        if !root.is_dir() {
            return StepReport::skipped(format!("{} not found", spec.dir));
        }

        let results = match self.discover_and_run_nested(pipeline, spec, ctx).await {
            Ok(results) => results,
            Err(e) => {
                error!("Could not read fixtures in {}: {}", root.display(), e);
                return StepReport::failed(
                    EXIT_FIXTURES_UNREADABLE,
                    format!("could not read fixtures in {}: {}", root.display(), e),
                );
            }
        };
        let mut report = match results.iter().find(|r| !r.is_success()) {
            Some(failed) => {
                let step = match &failed.status {
                    RunStatus::FailedAtStep { name, .. } => name.as_str(),
                    RunStatus::Success => "",
                };
                StepReport::failed(
                    failed.exit_code(),
                    format!(
                        "fixture {} failed at step {}",
                        failed.working_dir.display(),
                        step
                    ),
                )
            }
            None => StepReport::passed(),
        };
        report.fixtures = results;
        report
    }

    /// Run the pipeline again inside every fixture directory
    ///
    /// Fixtures are the immediate subdirectories of `spec.dir`, visited in
    /// name order. Each gets its own child context, runs the fixture command
    /// first when one is configured, and stops the iteration if it fails.
    /// Fails when the fixtures directory cannot be listed.
    pub async fn discover_and_run_nested(
        &self,
        pipeline: &Pipeline,
        spec: &FixtureSpec,
        ctx: &WorkContext,
    ) -> io::Result<Vec<RunResult>> {
        let fixtures = discover_fixtures(&ctx.resolve(&spec.dir))?;

        let nested = match &spec.run {
            Some(command) => pipeline.with_prelude(
                Step::command(FIXTURE_STEP_NAME, command.clone()).when(spec.when.clone()),
            ),
            None => pipeline.clone(),
        };

        let mut results = Vec::with_capacity(fixtures.len());
        for dir in fixtures {
            let child = ctx.scoped(&dir);
            info!("Entering fixture {}", dir.display());
            self.emit_event(ExecutionEvent::FixtureEntered {
                path: dir.clone(),
                depth: child.depth,
            });

            let result = self.run(&nested, &child).await;
            let failed = !result.is_success();
            results.push(result);
            if failed {
                break;
            }
        }
        Ok(results)
    }
}

/// Immediate subdirectories of `root`, sorted by name
///
/// Files and symlinks are ignored.
pub fn discover_fixtures(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(dirs)
}
