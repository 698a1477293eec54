//! Pipeline domain model

use crate::core::{
    config::PipelineConfig,
    context::WorkContext,
    step::{Step, StepDefaults},
};
use crate::markers::MarkerScope;
use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

/// A pipeline definition
///
/// Immutable while it runs; every run starts from the same definition.
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Pipeline name
    pub name: String,

    /// Environment overlay applied to every step
    pub env: BTreeMap<String, String>,

    /// Default values for `{{ name }}` placeholders
    pub variables: HashMap<String, String>,

    /// Steps in declaration order
    pub steps: Vec<Step>,
}

/// A step together with whether it would run in a given context
#[derive(Debug, Clone)]
pub struct PlannedStep<'a> {
    pub index: usize,
    pub step: &'a Step,
    pub skip_reason: Option<String>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            env: BTreeMap::new(),
            variables: HashMap::new(),
            steps,
        }
    }

    /// Create a pipeline from configuration
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let defaults = StepDefaults {
            marker_scope: config.markers.resolve(&MarkerScope::default()),
        };

        let steps = config
            .steps
            .iter()
            .map(|step_config| Step::from_config(step_config, &defaults))
            .collect::<Result<_>>()?;

        Ok(Pipeline {
            name: config.name.clone(),
            env: config.env.clone(),
            variables: config.variables.clone(),
            steps,
        })
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Get a step by name
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Step names in execution order
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name.as_str()).collect()
    }

    /// Copy of this pipeline with `step` run first
    ///
    /// An existing step with the same name is dropped, so applying the same
    /// prelude again does not stack it.
    pub fn with_prelude(&self, step: Step) -> Pipeline {
        let mut steps = Vec::with_capacity(self.steps.len() + 1);
        steps.extend(self.steps.iter().filter(|s| s.name != step.name).cloned());
        steps.insert(0, step);

        Pipeline {
            name: self.name.clone(),
            env: self.env.clone(),
            variables: self.variables.clone(),
            steps,
        }
    }

    /// Which steps would run in `ctx`, without running anything
    pub fn plan<'a>(&'a self, ctx: &WorkContext) -> Vec<PlannedStep<'a>> {
        let ctx = ctx.layered(&self.env, &self.variables);
        self.steps
            .iter()
            .enumerate()
            .map(|(index, step)| PlannedStep {
                index,
                step,
                skip_reason: step.skip_reason(&ctx),
            })
            .collect()
    }
}
