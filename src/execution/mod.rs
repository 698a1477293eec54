//! Pipeline execution engine

pub mod engine;
pub mod executor;
pub mod scheduler;

pub use engine::{
    discover_fixtures, EventHandler, ExecutionEngine, ExecutionEvent, RunFuture,
    EXIT_FIXTURES_UNREADABLE, FIXTURE_STEP_NAME,
};
pub use executor::{StepExecutor, StepOutcome, StepReport, EXIT_FORBIDDEN_MARKER};
pub use scheduler::StepCursor;
