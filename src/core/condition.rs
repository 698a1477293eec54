//! Step enablement toggles

use crate::core::context::WorkContext;
use serde::{Deserialize, Serialize};

/// Run-time toggles deciding whether an enabled step actually runs.
///
/// All set fields must hold. An empty condition always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableCondition {
    /// Run only when this variable is set to a truthy value
    #[serde(default)]
    pub env: Option<String>,

    /// Skip when this variable is set to a truthy value
    #[serde(default)]
    pub unless_env: Option<String>,

    /// Run only when this path exists, relative to the working directory
    #[serde(default)]
    pub exists: Option<String>,
}

impl EnableCondition {
    pub fn is_empty(&self) -> bool {
        self.env.is_none() && self.unless_env.is_none() && self.exists.is_none()
    }

    /// Evaluate against a context; `Some(reason)` means skip
    pub fn skip_reason(&self, ctx: &WorkContext) -> Option<String> {
        if let Some(var) = &self.env {
            if !ctx.env_flag(var) {
                return Some(format!("{} is not set", var));
            }
        }

        if let Some(var) = &self.unless_env {
            if ctx.env_flag(var) {
                return Some(format!("{} is set", var));
            }
        }

        if let Some(path) = &self.exists {
            if !ctx.resolve(path).exists() {
                return Some(format!("{} not found", path));
            }
        }

        None
    }
}
