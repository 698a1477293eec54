//! Test: Environment - overlay layering and variable substitution

use crate::helpers::*;
use ci_runner::core::config::PipelineConfig;
use ci_runner::core::WorkContext;
use ci_runner::execution::ExecutionEngine;
use tempfile::TempDir;

const YAML: &str = r#"
name: "Test: Environment"

env:
  MIRIFLAGS: "-Zmiri-backtrace=full"
  RUST_BACKTRACE: "1"

variables:
  toolchain: "nightly"

steps:
  - name: miri
    run: ["cargo", "+{{ toolchain }}", "miri", "test"]
  - name: quiet-miri
    run: ["cargo", "+{{ toolchain }}", "miri", "test", "--release"]
    env:
      RUST_BACKTRACE: "0"
"#;

/// Pipeline env reaches every step; step env wins for its own step
#[tokio::test]
async fn test_env_layers() {
    let pipeline = PipelineConfig::from_yaml(YAML).unwrap().to_pipeline().unwrap();
    let dir = TempDir::new().unwrap();
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
    let calls = toolchain.calls();
    assert_eq!(calls[0].env.get("MIRIFLAGS").unwrap(), "-Zmiri-backtrace=full");
    assert_eq!(calls[0].env.get("RUST_BACKTRACE").unwrap(), "1");
    assert_eq!(calls[1].env.get("RUST_BACKTRACE").unwrap(), "0");
    assert_eq!(calls[0].command, "cargo +nightly miri test");
}

/// Context overrides beat pipeline defaults, step env still wins
#[tokio::test]
async fn test_context_overrides() {
    let pipeline = PipelineConfig::from_yaml(YAML).unwrap().to_pipeline().unwrap();
    let dir = TempDir::new().unwrap();
    let toolchain = MockToolchain::new();

    let mut ctx = WorkContext::new(dir.path());
    ctx.set_env("MIRIFLAGS", "-Zmiri-disable-isolation");
    ctx.set_env("RUST_BACKTRACE", "full");
    ctx.set_variable("toolchain", "nightly-2024-06-01");

    let engine = ExecutionEngine::new(toolchain.clone());
    let result = engine.run(&pipeline, &ctx).await;

    assert_run_succeeded(&result);
    let calls = toolchain.calls();
    assert_eq!(calls[0].command, "cargo +nightly-2024-06-01 miri test");
    assert_eq!(calls[0].env.get("MIRIFLAGS").unwrap(), "-Zmiri-disable-isolation");
    assert_eq!(calls[0].env.get("RUST_BACKTRACE").unwrap(), "full");
    assert_eq!(calls[1].env.get("RUST_BACKTRACE").unwrap(), "0");

    // The caller's context is untouched
    assert!(ctx.get_variable("working_dir").is_none());
    assert_eq!(ctx.env_overlay.len(), 2);
}

/// Steps gated on an env toggle follow the overlay
#[tokio::test]
async fn test_env_toggle() {
    let yaml = r#"
name: "Test: Toggle"
steps:
  - name: slow-tests
    run: ["cargo", "test", "--release"]
    when:
      env: CI_RUNNER_SCENARIO_SLOW
  - name: fast-tests
    run: ["cargo", "test"]
    when:
      unless_env: CI_RUNNER_SCENARIO_SLOW
"#;
    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let dir = TempDir::new().unwrap();

    let toolchain = MockToolchain::new();
    run_with_mock(&pipeline, dir.path(), &toolchain).await;
    assert_eq!(toolchain.commands(), vec!["cargo test"]);

    let toolchain = MockToolchain::new();
    let mut ctx = WorkContext::new(dir.path());
    ctx.set_env("CI_RUNNER_SCENARIO_SLOW", "1");
    ExecutionEngine::new(toolchain.clone()).run(&pipeline, &ctx).await;
    assert_eq!(toolchain.commands(), vec!["cargo test --release"]);
}
