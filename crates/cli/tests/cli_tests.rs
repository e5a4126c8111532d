//! CLI integration tests

use std::process::Command;

fn kdash(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_kdash"))
        .args(args)
        .env_remove("KDASH_API_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = kdash(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Kubernetes workload dashboard"),
        "Should show app description"
    );
    for command in ["pause", "resume", "status", "paused", "get", "health"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
    assert!(stdout.contains("--direct"), "Should show direct option");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = kdash(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kdash"), "Should show binary name");
}

#[test]
fn test_pause_help() {
    let output = kdash(&["pause", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Pause help should succeed");
    assert!(stdout.contains("--owner-kind"), "Should show owner-kind option");
    assert!(stdout.contains("--owner-name"), "Should show owner-name option");
    assert!(stdout.contains("--wait"), "Should show wait option");
    assert!(stdout.contains("--timeout"), "Should show timeout option");
}

#[test]
fn test_resume_help() {
    let output = kdash(&["resume", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Resume help should succeed");
    assert!(stdout.contains("--replicas"), "Should show replicas option");
    assert!(stdout.contains("--wait"), "Should show wait option");
}

#[test]
fn test_get_help_lists_resources() {
    let output = kdash(&["get", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Get help should succeed");
    for resource in ["nodes", "namespaces", "pods", "deployments", "services"] {
        assert!(stdout.contains(resource), "Should list {resource}");
    }
    assert!(stdout.contains("--namespace"), "Should show namespace option");
}

#[test]
fn test_pause_requires_name() {
    let output = kdash(&["pause", "prod"]);

    assert!(!output.status.success(), "Missing name should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("<NAME>"), "Should report the missing argument");
}

#[test]
fn test_unknown_resource_is_rejected() {
    let output = kdash(&["get", "secrets"]);

    assert!(!output.status.success(), "Unknown resource should fail");
}

#[test]
fn test_unreachable_api_fails_cleanly() {
    let output = kdash(&["--api-url", "http://127.0.0.1:9", "paused"]);

    assert!(!output.status.success(), "Unreachable API should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Failed to send request"));
}
