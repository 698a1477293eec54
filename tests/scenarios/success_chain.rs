//! Test: Success Chain - every step passes

use crate::helpers::*;
use ci_runner::core::config::PipelineConfig;
use tempfile::TempDir;

/// All steps exit zero, in declaration order
#[tokio::test]
async fn test_all_steps_pass() {
    let yaml = r#"
name: "Test: Success Chain"

steps:
  - name: fmt
    run: ["cargo", "fmt", "--check"]
  - name: clippy
    run: ["cargo", "clippy", "--all-targets"]
  - name: test
    run: "cargo test --release"
"#;

    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let dir = TempDir::new().unwrap();
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
    assert_eq!(
        toolchain.commands(),
        vec![
            "cargo fmt --check",
            "cargo clippy --all-targets",
            "cargo test --release"
        ]
    );
    assert_eq!(result.executed_steps(), vec!["fmt", "clippy", "test"]);
    assert!(toolchain
        .calls()
        .iter()
        .all(|c| c.working_dir == dir.path()));
}

/// Disabled and gated steps are skipped without touching the status
#[tokio::test]
async fn test_disabled_steps_are_skipped() {
    let yaml = r#"
name: "Test: Skips"

steps:
  - name: fmt
    run: ["cargo", "fmt", "--check"]
  - name: off
    run: ["false"]
    enabled: false
  - name: nix-build
    run: ["nix", "build"]
    when:
      exists: flake.nix
  - name: test
    run: ["cargo", "test"]
"#;

    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let dir = TempDir::new().unwrap();
    let toolchain = MockToolchain::new().exit_with("false", 1);

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
    assert_step_skipped(&result, "off");
    assert_step_skipped(&result, "nix-build");
    assert_eq!(toolchain.commands(), vec!["cargo fmt --check", "cargo test"]);
}

/// A gated step runs once its file appears
#[tokio::test]
async fn test_gated_step_runs_when_file_exists() {
    let yaml = r#"
name: "Test: Gate"

steps:
  - name: git-stage
    run: ["git", "add", "-A"]
    tolerate_failure: true
    when:
      exists: flake.nix
  - name: nix-build
    run: ["nix", "build"]
    when:
      exists: flake.nix
"#;

    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("flake.nix"), "{ }").unwrap();
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
    assert_eq!(toolchain.commands(), vec!["git add -A", "nix build"]);
}

/// An empty pipeline succeeds
#[tokio::test]
async fn test_empty_pipeline_succeeds() {
    let pipeline = ci_runner::core::Pipeline::new("empty", Vec::new());
    let dir = TempDir::new().unwrap();
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
    assert!(toolchain.calls().is_empty());
}
