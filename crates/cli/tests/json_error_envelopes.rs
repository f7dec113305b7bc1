//! CLI regression tests for JSON error envelopes on setup failures.

use std::fs;
use std::process::Command;

use assert_cmd::cargo;

fn cmdtree() -> Command {
    Command::new(cargo::cargo_bin!("cmdtree"))
}

fn envelope(args: &[&str]) -> serde_json::Value {
    let output = cmdtree().args(args).output().expect("run cmdtree");
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout should be a JSON envelope");
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "command_failed");
    json
}

#[test]
fn missing_definitions_file_is_enveloped() {
    let json = envelope(&[
        "--output",
        "json",
        "--commands",
        "/definitely/not/here.json",
        "tree",
    ]);
    let message = json["message"].as_str().expect("message");
    assert!(message.contains("failed to read definitions file"), "{message}");
}

#[test]
fn conflicting_definitions_are_enveloped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("commands.json");
    fs::write(
        &path,
        r#"{ "commands": [ { "path": "a <x>" }, { "path": "a <y>" } ] }"#,
    )
    .expect("write definitions");
    let path = path.to_string_lossy().to_string();

    let json = envelope(&["--output", "json", "--commands", &path, "tree"]);
    let message = json["message"].as_str().expect("message");
    assert!(message.contains("failed to load command definitions"), "{message}");
}

#[test]
fn invalid_settings_are_enveloped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("settings.json");
    fs::write(&path, r#"{ "trailing_input": "explode" }"#).expect("write settings");
    let path = path.to_string_lossy().to_string();

    let json = envelope(&["--output", "json", "--settings", &path, "dispatch", "say hi"]);
    let message = json["message"].as_str().expect("message");
    assert!(message.contains("failed to load settings"), "{message}");
}
