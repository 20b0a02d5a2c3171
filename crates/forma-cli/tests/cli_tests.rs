//! Integration tests for the Forma CLI
//!
//! These tests invoke the actual forma binary and verify:
//! - Exit codes (0 = valid, 1 = errors, 2 = usage/file error)
//! - stdout/stderr output
//! - JSON output format
//! - All commands work end-to-end

use std::path::PathBuf;
use std::process::Command;

// ── Helpers ───────────────────────────────────────────────

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(format!("tests/fixtures/{}", name))
}

fn run_forma(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_forma"))
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .output()
        .expect("failed to execute forma")
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn path_arg(name: &str) -> String {
    fixture(name).to_string_lossy().to_string()
}

// ── validate ──────────────────────────────────────────────

#[test]
fn test_validate_valid_model() {
    let output = run_forma(&["validate", &path_arg("birdtracker.forma")]);
    assert!(output.status.success(), "valid model should exit 0");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("[OK]"), "should print [OK]: {}", stdout);
    assert!(stdout.contains("\"BirdTracker\" v1.0"));
    assert!(stdout.contains("0 warning(s)"));
}

#[test]
fn test_validate_warnings_still_valid() {
    let output = run_forma(&["validate", &path_arg("warnings.forma")]);
    assert!(output.status.success(), "warnings alone should exit 0");
    let stdout = stdout_of(&output);
    assert!(stdout.contains("warning[W015]"));
    assert!(stdout.contains("warning[W019]"));
    assert!(stdout.contains("[OK]"));
}

#[test]
fn test_validate_field_conflict() {
    let output = run_forma(&["validate", &path_arg("conflict.forma")]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = stdout_of(&output);
    assert!(stdout.contains("error[E090]"));
    assert!(stdout.contains("\"A\"") && stdout.contains("\"B\""));
    assert!(stdout.contains("[FAIL]"));
}

#[test]
fn test_validate_syntax_error() {
    let output = run_forma(&["validate", &path_arg("broken.forma")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("error[E000]"));
}

#[test]
fn test_validate_missing_file() {
    let output = run_forma(&["validate", "no-such-file.forma"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stderr_of(&output).contains("cannot read"));
}

// ── validate --json ───────────────────────────────────────

#[test]
fn test_validate_json_valid() {
    let output = run_forma(&["validate", "--json", &path_arg("birdtracker.forma")]);
    assert!(output.status.success());
    let report: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("stdout should be JSON");
    assert_eq!(report["valid"], serde_json::json!(true));
    assert_eq!(report["diagnostics"], serde_json::json!([]));
    // Expanded Bird carries both mixin fields and own fields.
    let fields: Vec<&str> = report["expanded"]["shapes"]["Bird"]
        .as_array()
        .expect("expanded shape should be an array")
        .iter()
        .filter_map(|f| f["name"].as_str())
        .collect();
    assert_eq!(
        fields,
        vec!["created_at", "updated_at", "current", "history", "name", "status", "tags", "notes"]
    );
}

#[test]
fn test_validate_json_conflict() {
    let output = run_forma(&["validate", "--json", &path_arg("conflict.forma")]);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("stdout should be JSON");
    assert_eq!(report["valid"], serde_json::json!(false));
    let codes: Vec<&str> = report["diagnostics"]
        .as_array()
        .expect("diagnostics should be an array")
        .iter()
        .filter_map(|d| d["code"].as_str())
        .collect();
    assert_eq!(codes, vec!["E090"]);
}

#[test]
fn test_validate_json_syntax_error() {
    let output = run_forma(&["validate", "--json", &path_arg("broken.forma")]);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("stdout should be JSON");
    assert_eq!(report["valid"], serde_json::json!(false));
    assert_eq!(report["diagnostics"][0]["code"], serde_json::json!("E000"));
}

// ── parse ─────────────────────────────────────────────────

#[test]
fn test_parse_prints_raw_ir() {
    let output = run_forma(&["parse", &path_arg("birdtracker.forma")]);
    assert!(output.status.success());
    let ir: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("stdout should be JSON");
    assert_eq!(ir["meta"]["name"], serde_json::json!("BirdTracker"));
    assert_eq!(ir["meta"]["namespace"], serde_json::json!("com.example.birds"));
    // Raw IR keeps includes unexpanded.
    assert_eq!(
        ir["shapes"]["Bird"]["includes"][1]["name"],
        serde_json::json!("Versioned")
    );
}

#[test]
fn test_parse_syntax_error() {
    let output = run_forma(&["parse", &path_arg("broken.forma")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("error[E000]"));
}

// ── hash ──────────────────────────────────────────────────

#[test]
fn test_hash_is_stable_hex() {
    let first = run_forma(&["hash", &path_arg("birdtracker.forma")]);
    let second = run_forma(&["hash", &path_arg("birdtracker.forma")]);
    assert!(first.status.success());
    let fingerprint = stdout_of(&first);
    let fingerprint = fingerprint.trim();
    assert_eq!(fingerprint.len(), 64);
    assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(fingerprint, stdout_of(&second).trim());
}

#[test]
fn test_hash_differs_between_models() {
    let a = run_forma(&["hash", &path_arg("birdtracker.forma")]);
    let b = run_forma(&["hash", &path_arg("conflict.forma")]);
    assert_ne!(stdout_of(&a), stdout_of(&b));
}

// ── merge ─────────────────────────────────────────────────

#[test]
fn test_merge_layers_satellites_in_order() {
    let output = run_forma(&[
        "merge",
        &path_arg("birdtracker.forma"),
        &path_arg("overrides.yml"),
        &path_arg("extra.yml"),
    ]);
    assert!(output.status.success(), "{}", stderr_of(&output));
    let merged: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("stdout should be JSON");
    // Hub content survives.
    assert_eq!(merged["meta"]["name"], serde_json::json!("BirdTracker"));
    // First satellite overrides a hub leaf.
    assert_eq!(
        merged["meta"]["description"],
        serde_json::json!("Regional deployment overrides")
    );
    // Second satellite wins over the first, non-conflicting keys accumulate.
    assert_eq!(merged["deployment"]["region"], serde_json::json!("us-east"));
    assert_eq!(merged["deployment"]["replicas"], serde_json::json!(2));
    assert_eq!(merged["deployment"]["flags"]["beta"], serde_json::json!(true));
}

#[test]
fn test_merge_with_no_satellites() {
    let output = run_forma(&["merge", &path_arg("birdtracker.forma")]);
    assert!(output.status.success());
    let merged: serde_json::Value =
        serde_json::from_str(&stdout_of(&output)).expect("stdout should be JSON");
    assert_eq!(merged["meta"]["name"], serde_json::json!("BirdTracker"));
}

#[test]
fn test_merge_refuses_invalid_hub() {
    let output = run_forma(&[
        "merge",
        &path_arg("conflict.forma"),
        &path_arg("overrides.yml"),
    ]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr_of(&output).contains("hub model is invalid"));
}

// ── usage ─────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    let output = run_forma(&["--help"]);
    assert!(output.status.success());
    let stdout = stdout_of(&output);
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("merge"));
}

#[test]
fn test_unknown_subcommand() {
    let output = run_forma(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}
