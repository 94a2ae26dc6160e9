//! Corruption recovery tests for the vitals binary.
//!
//! These tests verify the system can handle:
//! - Corrupted or truncated collection files
//! - An ignored-metric file of the wrong shape
//! - Invalid configuration

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("vitals"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(dir.join("data"));
    cmd
}

fn setup_test_dir() -> TempDir {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    fs::create_dir_all(temp_dir.path().join("data")).unwrap();
    temp_dir
}

#[test]
fn test_corrupted_sessions_file() {
    let temp_dir = setup_test_dir();
    let path = temp_dir.path().join("data/bp_sessions.json");
    fs::write(&path, "{ invalid json }}}}").unwrap();

    cli(temp_dir.path())
        .args(["bp", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions recorded."));

    // Next write replaces the corrupt file with a valid one
    cli(temp_dir.path())
        .args(["bp", "add", "--reading", "120/78", "--at", "2024-05-01 07:30"])
        .assert()
        .success();

    let contents = fs::read_to_string(&path).unwrap();
    let sessions: serde_json::Value = serde_json::from_str(&contents).expect("Still corrupt");
    assert_eq!(sessions.as_array().unwrap().len(), 1);
}

#[test]
fn test_wrong_shape_sessions_file() {
    let temp_dir = setup_test_dir();
    fs::write(
        temp_dir.path().join("data/bp_sessions.json"),
        r#"[{"session_id": 42}]"#,
    )
    .unwrap();

    cli(temp_dir.path())
        .args(["score", "--today", "2024-05-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blood pressure: not enough data"));
}

#[test]
fn test_truncated_sleep_file_leaves_sessions_intact() {
    let temp_dir = setup_test_dir();

    for at in ["2024-05-01 07:30", "2024-05-02 07:30"] {
        cli(temp_dir.path())
            .args(["bp", "add", "--reading", "118/76", "--at", at])
            .assert()
            .success();
    }

    // Simulate a partial write
    fs::write(
        temp_dir.path().join("data/sleep_entries.json"),
        r#"[{"id":"6f1c3c1e-4a44-4a8e-9b43-2b1c0f7f1a11","date":"2024-05-01","dura"#,
    )
    .unwrap();

    cli(temp_dir.path())
        .args(["score", "--today", "2024-05-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Blood pressure: 100"))
        .stdout(predicate::str::contains("Sleep: not enough data"));
}

#[test]
fn test_corrupted_ignored_metrics_file() {
    let temp_dir = setup_test_dir();
    let path = temp_dir.path().join("data/ignored_metrics.json");
    fs::write(&path, r#"{"ldl": true}"#).unwrap();

    cli(temp_dir.path())
        .arg("ignored")
        .assert()
        .success()
        .stdout(predicate::str::contains("No ignored metrics."));

    cli(temp_dir.path()).args(["ignore", "hdl"]).assert().success();

    let contents = fs::read_to_string(&path).unwrap();
    assert_eq!(contents, r#"["hdl"]"#);
}

#[test]
fn test_non_string_ignored_entry() {
    let temp_dir = setup_test_dir();
    fs::write(
        temp_dir.path().join("data/ignored_metrics.json"),
        r#"["ldl", 7]"#,
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("ignored")
        .assert()
        .success()
        .stdout(predicate::str::contains("No ignored metrics."));
}

#[test]
fn test_empty_files() {
    let temp_dir = setup_test_dir();
    for name in ["bp_sessions", "sleep_entries", "lab_results", "ignored_metrics"] {
        fs::write(temp_dir.path().join(format!("data/{}.json", name)), "").unwrap();
    }

    cli(temp_dir.path())
        .args(["score", "--today", "2024-05-03"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Keep tracking"));
}

#[test]
fn test_invalid_config_file_fails() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("vitals.toml");
    fs::write(&config_path, "[scoring]\nwindow_days = 0\n").unwrap();

    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("ignored")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_unparseable_config_file_fails() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("vitals.toml");
    fs::write(&config_path, "[registry\ndebounce_ms = ").unwrap();

    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .arg("ignored")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TOML error"));
}

#[test]
fn test_partial_config_uses_defaults() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("vitals.toml");
    fs::write(&config_path, "[registry]\ndebounce_ms = 50\n").unwrap();

    cli(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .args(["ignore", "tsh"])
        .assert()
        .success();

    assert!(temp_dir.path().join("data/ignored_metrics.json").exists());
}
