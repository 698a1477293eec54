//! Scenario-based tests for ci-runner
//!
//! Every scenario drives the engine with a recording toolchain, so no
//! external program is ever started.

mod helpers;

mod environment;
mod idempotence;
mod markers;
mod success_chain;
