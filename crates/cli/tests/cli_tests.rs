//! CLI integration tests

use std::process::{Command, Output};

fn drp(args: &[&str]) -> Output {
    let home = tempfile::TempDir::new().expect("Failed to create temp home");
    Command::new(env!("CARGO_BIN_EXE_drp"))
        .args(args)
        .env("HOME", home.path())
        .env_remove("DRP_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = drp(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Device Risk Predictor"), "Should show app name");
    assert!(stdout.contains("score"), "Should show score command");
    assert!(stdout.contains("device"), "Should show device command");
    assert!(stdout.contains("model"), "Should show model command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = drp(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("drp"), "Should show binary name");
}

#[test]
fn test_model_help_lists_lifecycle() {
    let output = drp(&["model", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    for command in ["status", "train", "retrain", "rollback"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

#[test]
fn test_train_help_shows_flags() {
    let output = drp(&["model", "train", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--no-synthetic"));
    assert!(stdout.contains("--no-db"));
}

/// Local scoring needs no running service
#[test]
fn test_score_locally_as_json() {
    let output = drp(&[
        "--format",
        "json",
        "score",
        "--cpu",
        "90",
        "--ram",
        "90",
        "--disk",
        "50",
        "--temperature",
        "90",
        "--battery",
        "80",
    ]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_str(&stdout).expect("Should print JSON");
    assert_eq!(report["risk_level"], "critical");
    assert_eq!(report["provenance"], "rule_based");
    assert_eq!(report["device_id"], "local");
}

#[test]
fn test_score_requires_usage_metrics() {
    let output = drp(&["score", "--cpu", "50"]);
    assert!(!output.status.success(), "Missing --ram/--disk should fail");
}

#[test]
fn test_invalid_format_rejected() {
    let output = drp(&["--format", "xml", "model", "status"]);
    assert!(!output.status.success());
}

#[test]
fn test_unreachable_service_fails() {
    let output = drp(&["--api-url", "http://127.0.0.1:1", "model", "status"]);
    assert!(!output.status.success());
}
