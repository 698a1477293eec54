//! Pipeline configuration from YAML

use crate::core::{condition::EnableCondition, Pipeline};
use crate::markers::MarkerScope;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// File name looked up in the working directory when no `--file` is given
pub const DEFAULT_CONFIG_FILE: &str = "ci-runner.yaml";

/// Pipeline shipped with the binary, used when no config file is found
pub const BUILTIN_PIPELINE: &str = include_str!("../../pipelines/default.yaml");

/// Placeholder substituted with each enumerated target
pub const TARGET_PLACEHOLDER: &str = "{{ target }}";

/// How a command is handed to the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Program followed by its arguments
    Argv(Vec<String>),
    /// Shell expression, run through the configured shell
    Shell(String),
}

impl CommandSpec {
    /// Whether there is nothing to run
    pub fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Argv(argv) => argv.first().map_or(true, |p| p.trim().is_empty()),
            CommandSpec::Shell(expr) => expr.trim().is_empty(),
        }
    }

    /// Human-readable form for logs and listings
    pub fn display(&self) -> String {
        match self {
            CommandSpec::Argv(argv) => argv.join(" "),
            CommandSpec::Shell(expr) => expr.clone(),
        }
    }
}

/// Where a pipeline definition came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Builtin,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Builtin => write!(f, "<builtin>"),
        }
    }
}

/// Top-level pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Environment overlay applied to every step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Variables substituted into `{{ name }}` placeholders
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Default scope for marker searches
    #[serde(default)]
    pub markers: MarkerScopeConfig,

    /// Pipeline steps, executed in declaration order
    pub steps: Vec<StepConfig>,
}

/// Marker search scope as written in YAML
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerScopeConfig {
    /// Directory names never descended into (defaults to build output and VCS metadata)
    #[serde(default)]
    pub exclude_dirs: Option<Vec<String>>,

    /// File names or relative paths never searched
    #[serde(default)]
    pub exclude_files: Vec<String>,
}

impl MarkerScopeConfig {
    /// Resolve into a scope, falling back to `base` for unset fields
    pub fn resolve(&self, base: &MarkerScope) -> MarkerScope {
        let mut exclude_files = base.exclude_files.clone();
        for file in &self.exclude_files {
            if !exclude_files.contains(file) {
                exclude_files.push(file.clone());
            }
        }

        MarkerScope {
            exclude_dirs: self
                .exclude_dirs
                .clone()
                .unwrap_or_else(|| base.exclude_dirs.clone()),
            exclude_files,
        }
    }
}

/// Step configuration as defined in YAML
///
/// Exactly one of `run`, `forbid_marker`, `report_marker`,
/// `for_each_target` or `fixtures` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique step name
    pub name: String,

    /// Optional step description
    #[serde(default)]
    pub description: Option<String>,

    /// Command to run
    #[serde(default)]
    pub run: Option<CommandSpec>,

    /// Marker whose presence fails the run
    #[serde(default)]
    pub forbid_marker: Option<String>,

    /// Marker whose matches are only reported
    #[serde(default)]
    pub report_marker: Option<String>,

    /// Command template run once per enumerated target
    #[serde(default)]
    pub for_each_target: Option<Vec<String>>,

    /// Nested runs over fixture directories
    #[serde(default)]
    pub fixtures: Option<FixturesConfig>,

    /// Treat marker strings as regular expressions
    #[serde(default)]
    pub use_regex: bool,

    /// Per-step marker scope (merged over the pipeline's)
    #[serde(default)]
    pub markers: Option<MarkerScopeConfig>,

    /// Keep going when this step exits non-zero
    #[serde(default)]
    pub tolerate_failure: bool,

    /// Static on/off switch
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Environment/filesystem toggles evaluated at run time
    #[serde(default)]
    pub when: EnableCondition,

    /// Extra environment for this step only
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Fixture discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturesConfig {
    /// Directory whose immediate subdirectories are fixtures
    pub dir: String,

    /// Command run inside each fixture before its nested pipeline
    #[serde(default)]
    pub run: Option<CommandSpec>,

    /// Toggles for the per-fixture command, evaluated inside the fixture
    #[serde(default)]
    pub when: EnableCondition,
}

fn default_enabled() -> bool {
    true
}

impl StepConfig {
    /// Names of the action fields set on this step
    fn actions(&self) -> Vec<&'static str> {
        let mut actions = Vec::new();
        if self.run.is_some() {
            actions.push("run");
        }
        if self.forbid_marker.is_some() {
            actions.push("forbid_marker");
        }
        if self.report_marker.is_some() {
            actions.push("report_marker");
        }
        if self.for_each_target.is_some() {
            actions.push("for_each_target");
        }
        if self.fixtures.is_some() {
            actions.push("fixtures");
        }
        actions
    }
}

impl PipelineConfig {
    /// Load pipeline configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("Invalid pipeline {}", path.display()))
    }

    /// Parse pipeline configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// The pipeline embedded in the binary
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_PIPELINE).context("Builtin pipeline is invalid")
    }

    /// Resolve the pipeline to use: an explicit file, `ci-runner.yaml` in
    /// `dir`, or the builtin pipeline
    pub fn load(file: Option<&Path>, dir: &Path) -> Result<(Self, ConfigSource)> {
        if let Some(file) = file {
            let path = if file.is_absolute() {
                file.to_path_buf()
            } else {
                dir.join(file)
            };
            return Ok((Self::from_file(&path)?, ConfigSource::File(path)));
        }

        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            return Ok((Self::from_file(&candidate)?, ConfigSource::File(candidate)));
        }

        Ok((Self::builtin()?, ConfigSource::Builtin))
    }

    /// Validate the pipeline configuration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Pipeline name must not be empty");
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.name.trim().is_empty() {
                anyhow::bail!("Step names must not be empty");
            }
            if !seen.insert(step.name.as_str()) {
                anyhow::bail!("Duplicate step name: {}", step.name);
            }

            let actions = step.actions();
            match actions.len() {
                0 => anyhow::bail!(
                    "Step '{}' has no action (expected one of run, forbid_marker, report_marker, for_each_target, fixtures)",
                    step.name
                ),
                1 => {}
                _ => anyhow::bail!(
                    "Step '{}' declares several actions: {}",
                    step.name,
                    actions.join(", ")
                ),
            }

            if let Some(run) = &step.run {
                if run.is_empty() {
                    anyhow::bail!("Step '{}' has an empty command", step.name);
                }
            }

            for marker in [&step.forbid_marker, &step.report_marker].into_iter().flatten() {
                if marker.is_empty() {
                    anyhow::bail!("Step '{}' has an empty marker", step.name);
                }
                if step.use_regex {
                    Regex::new(marker).with_context(|| {
                        format!("Step '{}' has an invalid marker regex", step.name)
                    })?;
                }
            }

            if step.forbid_marker.is_some() && step.tolerate_failure {
                anyhow::bail!(
                    "Step '{}' is a forbidden-marker gate and cannot tolerate failure",
                    step.name
                );
            }

            if let Some(template) = &step.for_each_target {
                if template.first().map_or(true, |p| p.trim().is_empty()) {
                    anyhow::bail!("Step '{}' has an empty target command", step.name);
                }
                if !template.iter().any(|arg| arg.contains(TARGET_PLACEHOLDER)) {
                    anyhow::bail!(
                        "Step '{}' target command never uses {}",
                        step.name,
                        TARGET_PLACEHOLDER
                    );
                }
            }

            if let Some(fixtures) = &step.fixtures {
                if fixtures.dir.trim().is_empty() {
                    anyhow::bail!("Step '{}' has an empty fixtures directory", step.name);
                }
                if let Some(run) = &fixtures.run {
                    if run.is_empty() {
                        anyhow::bail!("Step '{}' has an empty fixture command", step.name);
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate and convert config to a Pipeline domain model
    pub fn to_pipeline(&self) -> Result<Pipeline> {
        self.validate()?;
        Pipeline::from_config(self)
    }
}
