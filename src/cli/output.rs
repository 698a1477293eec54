//! CLI output formatting

use crate::{
    core::{PlannedStep, RunResult, RunStatus, StepState},
    execution::ExecutionEvent,
};
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");
pub static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "# ");

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::RunStarted {
            execution_id,
            pipeline_name,
            working_dir,
            depth,
            ..
        } => {
            let short_id: String = execution_id.simple().to_string().chars().take(8).collect();
            format!(
                "{}{} Running {} in {} ({})",
                indent(*depth),
                ROCKET,
                style(pipeline_name).bold(),
                style(working_dir.display()).cyan(),
                style(short_id).dim()
            )
        }
        ExecutionEvent::StepStarted {
            index,
            total,
            name,
            summary,
            depth,
        } => format!(
            "{}{} [{}/{}] {} {}",
            indent(*depth),
            SPINNER,
            index + 1,
            total,
            style(name).cyan(),
            style(summary).dim()
        ),
        ExecutionEvent::StepSkipped {
            name,
            reason,
            depth,
            ..
        } => format!(
            "{}{} {} ({})",
            indent(*depth),
            SKIP,
            style(name).dim(),
            reason
        ),
        ExecutionEvent::StepCompleted {
            name,
            duration,
            depth,
            ..
        } => format!(
            "{}{} {} {}",
            indent(*depth),
            CHECK,
            style(name).green(),
            style(format_duration(*duration)).dim()
        ),
        ExecutionEvent::StepTolerated {
            name,
            exit_code,
            depth,
            ..
        } => format!(
            "{}{} {} exited with {} (tolerated)",
            indent(*depth),
            WARN,
            style(name).yellow(),
            exit_code
        ),
        ExecutionEvent::StepFailed {
            name,
            error,
            depth,
            ..
        } => format!(
            "{}{} {}: {}",
            indent(*depth),
            CROSS,
            style(name).red(),
            style(error).dim()
        ),
        ExecutionEvent::MarkerMatches {
            marker,
            matches,
            fatal,
            depth,
            ..
        } => {
            let pad = indent(*depth);
            let icon = if *fatal { CROSS } else { INFO };
            let mut lines = vec![format!(
                "{}{} {} {} marker(s)",
                pad,
                icon,
                matches.len(),
                style(marker).bold()
            )];
            for m in matches {
                let line = format!("{}    {}", pad, m);
                lines.push(if *fatal {
                    style(line).red().to_string()
                } else {
                    style(line).dim().to_string()
                });
            }
            lines.join("\n")
        }
        ExecutionEvent::FixtureEntered { path, depth } => format!(
            "{}{} Fixture {}",
            indent(depth.saturating_sub(1)),
            FOLDER,
            style(path.display()).bold()
        ),
        ExecutionEvent::RunCompleted {
            pipeline_name,
            status,
            depth,
            ..
        } => {
            let status_str = match status {
                RunStatus::Success => style("succeeded").green().to_string(),
                RunStatus::FailedAtStep {
                    name, exit_code, ..
                } => format!(
                    "{} at {} (exit code {})",
                    style("failed").red(),
                    style(name).bold(),
                    exit_code
                ),
            };
            format!(
                "{}{} {} {}",
                indent(*depth),
                INFO,
                style(pipeline_name).bold(),
                status_str
            )
        }
    }
}

/// Format the final summary of a run
pub fn format_run_summary(result: &RunResult) -> String {
    let mut lines = Vec::new();

    match &result.status {
        RunStatus::Success => lines.push(format!(
            "{} {} completed {} in {}",
            CHECK,
            style(&result.pipeline_name).bold(),
            style("successfully").green(),
            format_duration(result.duration())
        )),
        RunStatus::FailedAtStep {
            name, exit_code, ..
        } => lines.push(format!(
            "{} {} {} at step {} (exit code {})",
            CROSS,
            style(&result.pipeline_name).bold(),
            style("failed").red(),
            style(name).bold(),
            exit_code
        )),
    }

    lines.push(format!(
        "  {} executed, {} tolerated, {} skipped",
        style(result.executed_steps().len()).cyan(),
        style(result.tolerated_steps().len()).yellow(),
        style(result.skipped_steps().len()).dim()
    ));

    for record in &result.steps {
        if let StepState::Tolerated { error, .. } = &record.state {
            lines.push(format!("  {} {}: {}", WARN, record.name, style(error).dim()));
        }
    }

    lines.join("\n")
}

/// Format one line of a step listing
pub fn format_planned_step(planned: &PlannedStep<'_>) -> String {
    let step = planned.step;
    let mut line = format!(
        "  {:>2}. {} {} {}",
        planned.index + 1,
        style(&step.name).bold(),
        style(format!("[{}]", step.kind())).cyan(),
        style(step.summary()).dim()
    );
    if step.tolerates_failure() {
        line.push_str(&format!(" {}", style("(tolerated)").yellow()));
    }
    if let Some(reason) = &planned.skip_reason {
        line.push_str(&format!(" {}", style(format!("skipped: {}", reason)).dim()));
    }
    line
}

/// Format a duration compactly
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
