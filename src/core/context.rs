//! Work context - the working directory and environment a run executes in
//!
//! Nothing in the runner changes the process-wide current directory or
//! environment. A run receives a `WorkContext` value, and nested runs receive
//! a child value from [`WorkContext::scoped`], so the parent is untouched
//! whatever the nested run does.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Execution context for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkContext {
    /// Directory commands run in and relative paths resolve against
    pub working_dir: PathBuf,

    /// Variables layered over the inherited process environment
    pub env_overlay: BTreeMap<String, String>,

    /// Values for `{{ name }}` placeholders
    pub variables: HashMap<String, String>,

    /// Nesting level (0 for the top-level run)
    pub depth: usize,
}

impl WorkContext {
    /// Create a context rooted at `working_dir` with an empty overlay
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            env_overlay: BTreeMap::new(),
            variables: HashMap::new(),
            depth: 0,
        }
    }

    /// Set an overlay variable
    pub fn set_env(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.env_overlay.insert(key.into(), value.into());
    }

    /// Set a template variable
    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(key.into(), value.into());
    }

    /// Get a template variable
    pub fn get_variable(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    /// Look up a variable in the overlay, then the inherited environment
    pub fn env_var(&self, key: &str) -> Option<String> {
        self.env_overlay
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    /// Whether a variable is set to something other than empty, `0` or `false`
    pub fn env_flag(&self, key: &str) -> bool {
        match self.env_var(key) {
            Some(value) => {
                let value = value.trim();
                !(value.is_empty() || value == "0" || value.eq_ignore_ascii_case("false"))
            }
            None => false,
        }
    }

    /// Resolve a path against the working directory
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }

    /// Child context for a nested run inside `dir`
    pub fn scoped(&self, dir: impl AsRef<Path>) -> WorkContext {
        WorkContext {
            working_dir: self.resolve(dir),
            env_overlay: self.env_overlay.clone(),
            variables: self.variables.clone(),
            depth: self.depth + 1,
        }
    }

    /// Layer pipeline defaults underneath this context's own entries
    pub fn layered(
        &self,
        env: &BTreeMap<String, String>,
        variables: &HashMap<String, String>,
    ) -> WorkContext {
        let mut env_overlay = env.clone();
        env_overlay.extend(self.env_overlay.clone());

        let mut merged_vars = variables.clone();
        merged_vars.extend(self.variables.clone());

        WorkContext {
            working_dir: self.working_dir.clone(),
            env_overlay,
            variables: merged_vars,
            depth: self.depth,
        }
    }

    /// Context for a single step with its own environment on top
    pub fn with_step_env(&self, env: &BTreeMap<String, String>) -> WorkContext {
        if env.is_empty() {
            return self.clone();
        }
        let mut ctx = self.clone();
        ctx.env_overlay.extend(env.clone());
        ctx
    }

    /// All variables available for command rendering
    pub fn get_rendering_variables(&self) -> HashMap<String, String> {
        let mut vars = self.variables.clone();
        vars.insert(
            "working_dir".to_string(),
            self.working_dir.display().to_string(),
        );
        vars
    }
}
