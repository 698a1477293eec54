//! ci-runner - a sequential, fail-fast CI pipeline runner

pub mod cli;
pub mod core;
pub mod execution;
pub mod markers;
pub mod toolchain;

// Re-export commonly used types
pub use core::{Pipeline, RunResult, RunStatus, Step, StepAction, StepState, WorkContext};
pub use execution::{ExecutionEngine, ExecutionEvent};
pub use markers::{MarkerMatch, MarkerScanner, MarkerScope};
pub use toolchain::{SubprocessToolchain, Toolchain, ToolError};
