//! Step executor - runs individual steps through the toolchain

use crate::{
    core::{
        config::CommandSpec, render_command, MarkerSearch, RunResult, Step, StepAction,
        WorkContext,
    },
    markers::{MarkerMatch, MarkerScanner},
    toolchain::{Invocation, Toolchain},
};
use tracing::{debug, error, info, warn};

/// Exit code of a forbidden-marker gate that found something
pub const EXIT_FORBIDDEN_MARKER: i32 = 1;

/// Outcome of running a step, before tolerance is applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Step exited zero
    Passed,
    /// Step exited non-zero
    Failed { exit_code: i32, error: String },
    /// Step found nothing to do
    Skipped { reason: String },
}

/// Everything a step produced
#[derive(Debug, Clone)]
pub struct StepReport {
    pub outcome: StepOutcome,
    pub markers: Vec<MarkerMatch>,
    pub targets: Vec<String>,
    pub fixtures: Vec<RunResult>,
}

impl StepReport {
    pub fn passed() -> Self {
        Self::with_outcome(StepOutcome::Passed)
    }

    pub fn failed(exit_code: i32, error: impl Into<String>) -> Self {
        Self::with_outcome(StepOutcome::Failed {
            exit_code,
            error: error.into(),
        })
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::with_outcome(StepOutcome::Skipped {
            reason: reason.into(),
        })
    }

    fn with_outcome(outcome: StepOutcome) -> Self {
        Self {
            outcome,
            markers: Vec::new(),
            targets: Vec::new(),
            fixtures: Vec::new(),
        }
    }
}

/// Executes a single step
pub struct StepExecutor<T> {
    toolchain: T,
}

impl<T: Toolchain> StepExecutor<T> {
    pub fn new(toolchain: T) -> Self {
        Self { toolchain }
    }

    pub fn toolchain(&self) -> &T {
        &self.toolchain
    }

    /// Execute a step in `ctx` and report what happened
    ///
    /// Fixture steps need the whole pipeline and are run by the engine.
    pub async fn execute(&self, step: &Step, ctx: &WorkContext) -> StepReport {
        info!(step = %step.name, kind = step.kind(), "Executing step");

        match &step.action {
            StepAction::Command(command) => {
                let command = render_command(command, &ctx.get_rendering_variables());
                StepReport::with_outcome(self.run_command(&command, ctx).await)
            }
            StepAction::ForbidMarker(search) => self.forbid_marker(search, ctx),
            StepAction::ReportMarker(search) => self.report_marker(search, ctx),
            StepAction::ForEachTarget(template) => self.for_each_target(template, ctx).await,
            StepAction::Fixtures(_) => StepReport::skipped("fixtures are run by the engine"),
        }
    }

    /// Run one command and map its exit status
    pub async fn run_command(&self, command: &CommandSpec, ctx: &WorkContext) -> StepOutcome {
        debug!("Running `{}` in {}", command.display(), ctx.working_dir.display());

        match self
            .toolchain
            .execute(&Invocation::new(command.clone(), ctx))
            .await
        {
            Ok(output) if output.success() => StepOutcome::Passed,
            Ok(output) => StepOutcome::Failed {
                exit_code: output.exit_code,
                error: format!("`{}` exited with code {}", command.display(), output.exit_code),
            },
            Err(e) => {
                error!("Could not run `{}`: {}", command.display(), e);
                StepOutcome::Failed {
                    exit_code: e.exit_code(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn forbid_marker(&self, search: &MarkerSearch, ctx: &WorkContext) -> StepReport {
        let marker = search.pattern.display();
        let scanner = MarkerScanner::new(&search.pattern, &search.scope);

        match scanner.scan(&ctx.working_dir) {
            Ok(matches) if matches.is_empty() => {
                info!("No {} markers found", marker);
                StepReport::passed()
            }
            Ok(matches) => {
                for m in &matches {
                    error!("Forbidden marker {} at {}", marker, m);
                }
                let mut report = StepReport::failed(
                    EXIT_FORBIDDEN_MARKER,
                    format!("found {} forbidden {} marker(s)", matches.len(), marker),
                );
                report.markers = matches;
                report
            }
            Err(e) => StepReport::failed(
                EXIT_FORBIDDEN_MARKER,
                format!("could not search {}: {}", ctx.working_dir.display(), e),
            ),
        }
    }

    fn report_marker(&self, search: &MarkerSearch, ctx: &WorkContext) -> StepReport {
        let marker = search.pattern.display();
        let scanner = MarkerScanner::new(&search.pattern, &search.scope);

        let mut report = StepReport::passed();
        match scanner.scan(&ctx.working_dir) {
            Ok(matches) => {
                info!("Found {} {} marker(s)", matches.len(), marker);
                report.markers = matches;
            }
            Err(e) => warn!("Could not search {}: {}", ctx.working_dir.display(), e),
        }
        report
    }

    async fn for_each_target(&self, template: &[String], ctx: &WorkContext) -> StepReport {
        let targets = self.toolchain.enumerate_targets(ctx).await;
        if targets.is_empty() {
            info!("No targets found in {}", ctx.working_dir.display());
            return StepReport::passed();
        }

        let mut visited = Vec::with_capacity(targets.len());
        let mut outcome = StepOutcome::Passed;
        let template = CommandSpec::Argv(template.to_vec());

        for target in targets {
            let mut variables = ctx.get_rendering_variables();
            variables.insert("target".to_string(), target.clone());
            let command = render_command(&template, &variables);

            debug!(target = %target, "Running target");
            let result = self.run_command(&command, ctx).await;
            visited.push(target.clone());

            if let StepOutcome::Failed { exit_code, error } = result {
                warn!("Target {} failed with exit code {}", target, exit_code);
                outcome = StepOutcome::Failed {
                    exit_code,
                    error: format!("target {}: {}", target, error),
                };
                break;
            }
        }

        let mut report = StepReport::with_outcome(outcome);
        report.targets = visited;
        report
    }
}
