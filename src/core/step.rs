//! Step domain model

use crate::core::{
    condition::EnableCondition,
    config::{CommandSpec, StepConfig},
    context::WorkContext,
};
use crate::markers::MarkerScope;
use anyhow::Result;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};

/// A single step in a pipeline
#[derive(Debug, Clone)]
pub struct Step {
    /// Unique step name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// What the step invokes
    pub action: StepAction,

    /// A non-zero exit is recorded but does not stop the run
    pub tolerate_failure: bool,

    /// Static on/off switch
    pub enabled: bool,

    /// Run-time toggles
    pub when: EnableCondition,

    /// Extra environment for this step
    pub env: BTreeMap<String, String>,
}

/// What a step does when it runs
#[derive(Debug, Clone)]
pub enum StepAction {
    /// Invoke an external command
    Command(CommandSpec),
    /// Fail the run if the marker occurs anywhere in scope
    ForbidMarker(MarkerSearch),
    /// Report marker occurrences without affecting the run
    ReportMarker(MarkerSearch),
    /// Run a command template once per enumerated target
    ForEachTarget(Vec<String>),
    /// Run the pipeline again inside every fixture directory
    Fixtures(FixtureSpec),
}

/// Marker pattern plus the part of the tree it is searched in
#[derive(Debug, Clone)]
pub struct MarkerSearch {
    pub pattern: ConditionPattern,
    pub scope: MarkerScope,
}

/// Fixture discovery for a `Fixtures` step
#[derive(Debug, Clone)]
pub struct FixtureSpec {
    /// Directory whose immediate subdirectories are fixtures
    pub dir: String,

    /// Command run inside each fixture before its nested pipeline
    pub run: Option<CommandSpec>,

    /// Toggles for `run`, evaluated inside the fixture
    pub when: EnableCondition,
}

/// Pattern for matching text lines (not serializable due to Regex)
#[derive(Debug, Clone)]
pub enum ConditionPattern {
    /// Simple string contains match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ConditionPattern {
    /// Build a pattern, falling back to a plain substring if the regex is invalid
    pub fn new(pattern: &str, use_regex: bool) -> Self {
        if use_regex {
            match Regex::new(pattern) {
                Ok(regex) => ConditionPattern::Regex(regex),
                Err(_) => ConditionPattern::Simple(pattern.to_string()),
            }
        } else {
            ConditionPattern::Simple(pattern.to_string())
        }
    }

    /// Check if the pattern matches the given text
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ConditionPattern::Simple(pattern) => text.contains(pattern.as_str()),
            ConditionPattern::Regex(regex) => regex.is_match(text),
        }
    }

    pub fn display(&self) -> String {
        match self {
            ConditionPattern::Simple(s) => s.clone(),
            ConditionPattern::Regex(r) => format!("[regex: {}]", r.as_str()),
        }
    }
}

/// Settings inherited from the pipeline when building steps
#[derive(Debug, Clone, Default)]
pub struct StepDefaults {
    pub marker_scope: MarkerScope,
}

impl Step {
    /// A fail-fast command step
    pub fn command(name: impl Into<String>, command: CommandSpec) -> Self {
        Self::with_action(name, StepAction::Command(command))
    }

    /// A fail-fast argv command step
    pub fn argv<I, S>(name: impl Into<String>, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::command(name, CommandSpec::Argv(argv.into_iter().map(Into::into).collect()))
    }

    /// A forbidden-marker gate over the default scope
    pub fn forbid_marker(name: impl Into<String>, marker: &str) -> Self {
        Self::with_action(
            name,
            StepAction::ForbidMarker(MarkerSearch {
                pattern: ConditionPattern::Simple(marker.to_string()),
                scope: MarkerScope::default(),
            }),
        )
    }

    /// An advisory-marker report over the default scope
    pub fn report_marker(name: impl Into<String>, marker: &str) -> Self {
        Self::with_action(
            name,
            StepAction::ReportMarker(MarkerSearch {
                pattern: ConditionPattern::Simple(marker.to_string()),
                scope: MarkerScope::default(),
            }),
        )
    }

    pub fn with_action(name: impl Into<String>, action: StepAction) -> Self {
        Step {
            name: name.into(),
            description: None,
            action,
            tolerate_failure: false,
            enabled: true,
            when: EnableCondition::default(),
            env: BTreeMap::new(),
        }
    }

    /// Mark this step's failures as tolerated
    pub fn tolerated(mut self) -> Self {
        self.tolerate_failure = true;
        self
    }

    /// Disable this step
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn when(mut self, when: EnableCondition) -> Self {
        self.when = when;
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Create a step from its config
    ///
    /// Fails when the config names no action.
    pub fn from_config(config: &StepConfig, defaults: &StepDefaults) -> Result<Self> {
        let scope = match &config.markers {
            Some(overlay) => overlay.resolve(&defaults.marker_scope),
            None => defaults.marker_scope.clone(),
        };

        let action = if let Some(run) = &config.run {
            StepAction::Command(run.clone())
        } else if let Some(marker) = &config.forbid_marker {
            StepAction::ForbidMarker(MarkerSearch {
                pattern: ConditionPattern::new(marker, config.use_regex),
                scope,
            })
        } else if let Some(marker) = &config.report_marker {
            StepAction::ReportMarker(MarkerSearch {
                pattern: ConditionPattern::new(marker, config.use_regex),
                scope,
            })
        } else if let Some(template) = &config.for_each_target {
            StepAction::ForEachTarget(template.clone())
        } else if let Some(fixtures) = &config.fixtures {
            StepAction::Fixtures(FixtureSpec {
                dir: fixtures.dir.clone(),
                run: fixtures.run.clone(),
                when: fixtures.when.clone(),
            })
        } else {
            anyhow::bail!("Step '{}' has no action", config.name);
        };

        Ok(Step {
            name: config.name.clone(),
            description: config.description.clone(),
            action,
            tolerate_failure: config.tolerate_failure,
            enabled: config.enabled,
            when: config.when.clone(),
            env: config.env.clone(),
        })
    }

    /// Why this step will not run in `ctx`, if it won't
    pub fn skip_reason(&self, ctx: &WorkContext) -> Option<String> {
        if !self.enabled {
            return Some("disabled".to_string());
        }
        self.when.skip_reason(ctx)
    }

    /// Whether a failure of this step may be tolerated
    pub fn tolerates_failure(&self) -> bool {
        self.tolerate_failure && !matches!(self.action, StepAction::ForbidMarker(_))
    }

    /// Short action label for listings
    pub fn kind(&self) -> &'static str {
        match self.action {
            StepAction::Command(_) => "command",
            StepAction::ForbidMarker(_) => "forbid-marker",
            StepAction::ReportMarker(_) => "report-marker",
            StepAction::ForEachTarget(_) => "for-each-target",
            StepAction::Fixtures(_) => "fixtures",
        }
    }

    /// One-line summary of what the step invokes
    pub fn summary(&self) -> String {
        match &self.action {
            StepAction::Command(command) => command.display(),
            StepAction::ForbidMarker(search) => format!("forbid {}", search.pattern.display()),
            StepAction::ReportMarker(search) => format!("report {}", search.pattern.display()),
            StepAction::ForEachTarget(template) => template.join(" "),
            StepAction::Fixtures(spec) => format!("{}/*", spec.dir),
        }
    }
}

/// Replace `{{ name }}` placeholders with their values
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (key, value) in variables {
        let placeholder = format!("{{{{ {} }}}}", key);
        rendered = rendered.replace(&placeholder, value);
    }
    rendered
}

/// Render every part of a command
pub fn render_command(command: &CommandSpec, variables: &HashMap<String, String>) -> CommandSpec {
    match command {
        CommandSpec::Argv(argv) => CommandSpec::Argv(
            argv.iter()
                .map(|arg| render_template(arg, variables))
                .collect(),
        ),
        CommandSpec::Shell(expr) => CommandSpec::Shell(render_template(expr, variables)),
    }
}
