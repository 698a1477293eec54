//! Test: Markers - forbidden-marker gate and advisory report

use crate::helpers::*;
use ci_runner::core::config::PipelineConfig;
use ci_runner::core::{Pipeline, Step};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, content) in files {
        let full = dir.path().join(path);
        fs::create_dir_all(full.parent().unwrap()).unwrap();
        fs::write(full, content).unwrap();
    }
    dir
}

/// Any FIXME fails the run with exit code 1, even if the step is tolerated
#[tokio::test]
async fn test_forbidden_marker_fails_run() {
    let dir = tree(&[
        ("src/lib.rs", "pub fn f() {}\n// FIXME: overflow\n"),
        ("README.md", "docs\n"),
    ]);
    let pipeline = Pipeline::new(
        "Test: Gate",
        vec![
            Step::argv("fmt", ["cargo", "fmt"]),
            Step::forbid_marker("no-fixme", "FIXME").tolerated(),
            Step::argv("after", ["after"]),
        ],
    );
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_failed_at(&result, "no-fixme", 1);
    assert_eq!(toolchain.commands(), vec!["cargo fmt"]);

    let record = result.step("no-fixme").unwrap();
    assert_eq!(record.markers.len(), 1);
    assert_eq!(record.markers[0].path, PathBuf::from("src/lib.rs"));
    assert_eq!(record.markers[0].line, 2);
}

/// A Latin-1 file is still text; its FIXME fails the gate
#[tokio::test]
async fn test_forbidden_marker_in_non_utf8_file_fails_run() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("notes.txt"), b"caf\xe9\n// FIXME: broken\n").unwrap();
    let pipeline = Pipeline::new("Test: Gate", vec![Step::forbid_marker("no-fixme", "FIXME")]);
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_failed_at(&result, "no-fixme", 1);
    let record = result.step("no-fixme").unwrap();
    assert_eq!(record.markers.len(), 1);
    assert_eq!(record.markers[0].path, PathBuf::from("notes.txt"));
    assert_eq!(record.markers[0].line, 2);
}

/// A clean tree passes the gate
#[tokio::test]
async fn test_forbidden_marker_passes_clean_tree() {
    let dir = tree(&[("src/lib.rs", "pub fn f() {}\n")]);
    let pipeline = Pipeline::new("Test: Gate", vec![Step::forbid_marker("no-fixme", "FIXME")]);
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
}

/// Build output, VCS metadata and excluded files are not searched
#[tokio::test]
async fn test_gate_respects_exclusions() {
    let yaml = r#"
name: "Test: Gate Scope"
markers:
  exclude_files: ["ci-runner.yaml"]
steps:
  - name: no-fixme
    forbid_marker: FIXME
"#;
    let dir = tree(&[
        ("target/debug/out.txt", "FIXME"),
        (".git/COMMIT_EDITMSG", "FIXME later"),
        ("ci-runner.yaml", "forbid_marker: FIXME"),
        ("src/main.rs", "fn main() {}"),
    ]);
    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_run_succeeded(&result);
}

/// The advisory report never changes the status
#[tokio::test]
async fn test_advisory_report_never_fails() {
    let clean = tree(&[("src/lib.rs", "pub fn f() {}\n")]);
    let noisy = tree(&[
        ("src/lib.rs", "// TODO: one\n// TODO: two\n"),
        ("src/bin/main.rs", "// TODO: three\n"),
    ]);
    let pipeline = Pipeline::new(
        "Test: Report",
        vec![
            Step::report_marker("todo-report", "TODO"),
            Step::argv("after", ["after"]),
        ],
    );

    let toolchain = MockToolchain::new();
    let clean_result = run_with_mock(&pipeline, clean.path(), &toolchain).await;
    let noisy_result = run_with_mock(&pipeline, noisy.path(), &toolchain).await;

    assert_run_succeeded(&clean_result);
    assert_run_succeeded(&noisy_result);
    assert_eq!(clean_result.status, noisy_result.status);
    assert!(clean_result.step("todo-report").unwrap().markers.is_empty());
    assert_eq!(noisy_result.step("todo-report").unwrap().markers.len(), 3);
    assert_eq!(toolchain.commands(), vec!["after", "after"]);
}

/// Regex markers are supported
#[tokio::test]
async fn test_regex_marker() {
    let yaml = r#"
name: "Test: Regex Marker"
steps:
  - name: no-dbg
    forbid_marker: '\bdbg!\('
    use_regex: true
"#;
    let dir = tree(&[("src/lib.rs", "fn f() { dbg!(1); }\n")]);
    let pipeline = PipelineConfig::from_yaml(yaml).unwrap().to_pipeline().unwrap();
    let toolchain = MockToolchain::new();

    let result = run_with_mock(&pipeline, dir.path(), &toolchain).await;

    assert_failed_at(&result, "no-dbg", 1);
}
