//! Test: Idempotence - runs on an unchanged tree agree

use crate::helpers::*;
use ci_runner::core::{Pipeline, Step};
use std::fs;
use tempfile::TempDir;

/// The same pipeline twice on the same tree gives the same status and invocations
#[tokio::test]
async fn test_repeated_runs_agree() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("examples/b")).unwrap();
    fs::create_dir_all(dir.path().join("examples/a")).unwrap();
    fs::write(dir.path().join("notes.md"), "TODO: write docs\n").unwrap();

    let pipeline = Pipeline::new(
        "Test: Idempotence",
        vec![
            Step::argv("update", ["rustup", "update"]).tolerated(),
            Step::argv("fmt", ["cargo", "fmt", "--check"]),
            Step::report_marker("todo-report", "TODO"),
            Step::argv("clippy", ["cargo", "clippy"]),
        ],
    );

    let first = MockToolchain::new().exit_with("rustup", 1).exit_with("clippy", 101);
    let second = MockToolchain::new().exit_with("rustup", 1).exit_with("clippy", 101);

    let a = run_with_mock(&pipeline, dir.path(), &first).await;
    let b = run_with_mock(&pipeline, dir.path(), &second).await;

    assert_eq!(a.status, b.status);
    assert_failed_at(&a, "clippy", 101);
    assert_eq!(first.commands(), second.commands());
    assert_eq!(
        a.step("todo-report").unwrap().markers,
        b.step("todo-report").unwrap().markers
    );
    assert_ne!(a.execution_id, b.execution_id);
}
