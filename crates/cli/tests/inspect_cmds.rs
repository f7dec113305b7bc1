//! CLI regression tests for `suggest`, `tree`, and `explain`.

use std::process::Command;

use assert_cmd::cargo;

fn cmdtree() -> Command {
    Command::new(cargo::cargo_bin!("cmdtree"))
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let output = cmdtree()
        .args(["--output", "json"])
        .args(args)
        .output()
        .expect("run cmdtree");
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

fn strings(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|v| v.as_str().expect("string").to_string())
        .collect()
}

#[test]
fn suggest_lists_item_candidates() {
    let json = run_json(&["suggest", "give @s di"]);
    assert_eq!(json["input"], "give @s di");
    assert_eq!(
        strings(&json["suggestions"]),
        ["diamond", "dirt", "diorite"]
    );
}

#[test]
fn suggest_hides_secret_and_forbidden_commands() {
    let roots = strings(&run_json(&["suggest", ""])["suggestions"]);
    assert!(roots.contains(&"give".to_string()));
    assert!(!roots.contains(&"vanish".to_string()));
    assert!(!roots.contains(&"ban".to_string()));

    let roots = strings(&run_json(&["--grant", "mod.ban", "suggest", ""])["suggestions"]);
    assert!(roots.contains(&"ban".to_string()));
}

#[test]
fn suggest_offers_flags() {
    let json = run_json(&["--grant", "mod.ban", "suggest", "ban bob -"]);
    assert_eq!(
        strings(&json["suggestions"]),
        ["--reason", "-r", "--days", "-d"]
    );
}

#[test]
fn suggest_pretty_prints_one_per_line() {
    let output = cmdtree()
        .args(["--output", "pretty", "suggest", "team "])
        .output()
        .expect("run suggest");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "add\nremove\n");
}

#[test]
fn tree_lists_usage_for_every_command() {
    let json = run_json(&["tree"]);
    let commands = json.as_array().expect("array of commands");
    let ban = commands
        .iter()
        .find(|c| c["path"] == "ban <player>")
        .expect("ban is registered");
    assert_eq!(ban["usage"], "ban <player> --reason <reason> [--days <days>]");
    assert_eq!(ban["permission"], "mod.ban");
    assert!(
        commands.iter().any(|c| c["path"] == "vanish" && c["secret"] == true),
        "secret commands are still listed"
    );
}

#[test]
fn explain_known_code() {
    let json = run_json(&["explain", "CMD1101"]);
    assert_eq!(json["id"], "CMD1101");
    let text = json["explanation"].as_str().expect("explanation");
    assert!(text.contains("whole number"), "{text}");
}

#[test]
fn explain_unknown_code_is_null() {
    let json = run_json(&["explain", "CMD9999"]);
    assert!(json["explanation"].is_null());
}
