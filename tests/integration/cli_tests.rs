//! CLI integration tests
//!
//! Only paths that fail or finish before a cluster connection is needed.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn kor() -> Command {
    let mut cmd = Command::cargo_bin("kor").unwrap();
    cmd.env_remove("KUBECONFIG")
        .env_remove("KOR_SLACK_WEBHOOK_URL")
        .env_remove("KOR_SLACK_AUTH_TOKEN");
    cmd
}

#[test]
fn test_help_lists_flags() {
    kor()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--delete"))
        .stdout(predicate::str::contains("--group-by"))
        .stdout(predicate::str::contains("--exclude-labels"));
}

#[test]
fn test_version() {
    kor()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_missing_kind_argument() {
    kor().assert().failure();
}

#[test]
fn test_unknown_kind() {
    kor()
        .arg("widgets")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown resource kind 'widgets'"));
}

#[test]
fn test_no_interactive_requires_delete() {
    kor().args(["deploy", "--no-interactive"]).assert().failure();
}

#[test]
fn test_unknown_output_format() {
    kor().args(["all", "-o", "xml"]).assert().failure();
}

#[test]
fn test_missing_kubeconfig_is_setup_failure() {
    kor()
        .args(["all", "--kubeconfig", "/nonexistent/kubeconfig", "-q"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_unparseable_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("kor.json");
    fs::write(&path, "{ not json").unwrap();

    kor()
        .args(["cm", "--kubeconfig", "/nonexistent/kubeconfig", "-c"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("exception configuration"));
}
