//! CLI command contract tests
//!
//! Runs the `gnbt` binary against temp workspaces seeded with bundle
//! fixtures. Contract guarantees tested:
//! - Deterministic exit codes
//! - Stable JSON shape for `classify` results
//! - Plain-text output without ANSI escapes
//! - Actionable error messages for failure paths

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;

// =============================================================================
// Test fixture helpers
// =============================================================================

/// Temp workspace holding an empty `gnbtriage.toml`.
fn setup_workspace() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    std::fs::write(dir.path().join("gnbtriage.toml"), "[logging]\nlevel = \"warn\"\n")
        .expect("write config");
    dir
}

fn write_bundle(dir: &Path, name: &str, logs: &Value, filename: &str) {
    std::fs::create_dir_all(dir).expect("create case dir");
    let doc = json!({
        "logs": logs,
        "original_json_data": { "filename": filename, "affected_module": "PHY" }
    });
    std::fs::write(dir.join(name), doc.to_string()).expect("write bundle");
}

/// One crash, one corroborated success, one abnormal bundle.
fn seed_cases(root: &Path) {
    let case = root.join("op1_case_1");
    write_bundle(
        &case,
        "001.json",
        &json!({ "du.stdout.log": "Assertion (gtpInst > 0) failed!\nExiting execution" }),
        "du_gnb.conf",
    );
    write_bundle(
        &case,
        "002.json",
        &json!({ "ue.stdout.log": "Received PDU Session Establishment Accept\nRRC_CONNECTED reached\nIPv4 10.0.0.2" }),
        "ue.conf",
    );
    write_bundle(
        &case,
        "003.json",
        &json!({ "cu.stdout.log": "[RRC] ERROR while encoding SIB1" }),
        "cu_gnb.conf",
    );
}

fn write_jsonl(path: &Path) {
    let lines = [
        json!({ "logs": { "du": "Assertion (gtpInst > 0) failed!" }, "misconfigured_param": "local_n_address" }),
        json!({ "logs": { "cu": "[SCTP] Connection refused" } }),
    ];
    let mut text: String = lines.iter().map(|l| format!("{l}\n")).collect();
    text.push_str("{ broken\n");
    std::fs::write(path, text).expect("write jsonl");
}

fn gnbt_cmd(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gnbt").expect("gnbt binary");
    cmd.current_dir(workspace);
    cmd.env("GNBT_CONFIG", workspace.join("gnbtriage.toml"));
    cmd.env_remove("GNBT_LOG_LEVEL");
    cmd
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn assert_no_ansi(text: &str) {
    assert!(!text.contains('\u{1b}'), "unexpected ANSI escape in: {text}");
}

// =============================================================================
// Help and introspection
// =============================================================================

#[test]
fn contract_help_lists_commands() {
    let ws = setup_workspace();
    gnbt_cmd(ws.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("classify"))
        .stdout(predicate::str::contains("organize"))
        .stdout(predicate::str::contains("categorize"))
        .stdout(predicate::str::contains("breakdown"));
}

#[test]
fn contract_rules_lists_stable_ids() {
    let ws = setup_workspace();
    let output = gnbt_cmd(ws.path()).arg("rules").output().expect("run gnbt");
    assert!(output.status.success());
    let text = stdout_of(&output);
    assert_no_ansi(&text);
    for id in ["crash:config-execcheck", "abnormal:critical"] {
        assert!(text.contains(id), "missing rule {id}");
    }
    assert!(text.contains("segmentation fault"));
    assert!(text.contains("/Segmentation fault/"));
    assert!(text.lines().all(|l| !l.trim().is_empty()));
}

#[test]
fn contract_config_prints_effective_toml() {
    let ws = setup_workspace();
    let output = gnbt_cmd(ws.path()).arg("config").output().expect("run gnbt");
    assert!(output.status.success());
    let text = stdout_of(&output);
    let parsed: toml::Value = toml::from_str(&text).expect("config output is TOML");
    assert_eq!(parsed["logging"]["level"].as_str(), Some("warn"));
    assert_eq!(
        parsed["classifier"]["connect_failure_threshold"].as_integer(),
        Some(10)
    );
}

// =============================================================================
// classify / summary
// =============================================================================

#[test]
fn contract_classify_emits_json_report() {
    let ws = setup_workspace();
    seed_cases(ws.path());

    let output = gnbt_cmd(ws.path())
        .args(["classify", "op1_case_1"])
        .output()
        .expect("run gnbt");
    assert!(output.status.success());
    let report: Value = serde_json::from_str(&stdout_of(&output)).expect("stdout is JSON");

    assert_eq!(report["total"], 3);
    let stages: Vec<i64> = report["records"]
        .as_array()
        .expect("records array")
        .iter()
        .map(|r| r["severity_stage"].as_i64().expect("stage"))
        .collect();
    assert_eq!(stages, vec![1, 0, 2]);
    assert_eq!(report["records"][0]["component"], "DU");
    assert!(report["generated_at"].is_string());
}

#[test]
fn contract_classify_to_file_then_summary() {
    let ws = setup_workspace();
    seed_cases(ws.path());

    gnbt_cmd(ws.path())
        .args(["classify", "op1_case_1", "--output", "out/results.json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Total files analyzed: 3"));
    assert!(ws.path().join("out/results.json").exists());

    let output = gnbt_cmd(ws.path())
        .args(["summary", "out/results.json", "--output", "out/summary.txt"])
        .output()
        .expect("run gnbt");
    assert!(output.status.success());
    let text = stdout_of(&output);
    assert_no_ansi(&text);
    assert!(text.contains("Severity 1 - Component Crash: 1"));
    let written = std::fs::read_to_string(ws.path().join("out/summary.txt")).expect("summary file");
    assert_eq!(written, text);
}

#[test]
fn contract_classify_caps_evidence_at_configured_limit() {
    let ws = setup_workspace();
    write_bundle(
        &ws.path().join("noisy"),
        "001.json",
        &json!({ "du.stdout.log": "Assertion (gtpInst > 0) failed!\nExiting execution\nSegmentation fault\nfatal error" }),
        "du_gnb.conf",
    );

    let evidence_of = |extra: &[&str]| -> Vec<Value> {
        let output = gnbt_cmd(ws.path())
            .args(["classify", "noisy"])
            .args(extra)
            .output()
            .expect("run gnbt");
        assert!(output.status.success());
        let report: Value = serde_json::from_str(&stdout_of(&output)).expect("stdout is JSON");
        report["records"][0]["evidence_keywords"]
            .as_array()
            .expect("evidence array")
            .clone()
    };

    let capped = evidence_of(&[]);
    assert_eq!(
        capped,
        vec![
            json!("crash:assertion-failed"),
            json!("crash:exiting-execution"),
            json!("crash:segfault"),
        ]
    );
    let full = evidence_of(&["--evidence-limit", "10"]);
    assert_eq!(full.len(), 5);
    assert_eq!(full[4], json!("gtpInst > 0"));
}

#[test]
fn contract_classify_without_inputs_fails_with_remediation() {
    let ws = setup_workspace();
    gnbt_cmd(ws.path())
        .arg("classify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"))
        .stderr(predicate::str::contains("To fix:"));
}

#[test]
fn contract_missing_config_file_fails() {
    let ws = setup_workspace();
    gnbt_cmd(ws.path())
        .args(["--config", "nope.toml", "rules"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope.toml"));
}

// =============================================================================
// organize / isolate
// =============================================================================

#[test]
fn contract_organize_builds_severity_tree() {
    let ws = setup_workspace();
    seed_cases(&ws.path().join("merged"));

    gnbt_cmd(ws.path())
        .args(["organize", "merged", "classified"])
        .assert()
        .success()
        .stdout(predicate::str::contains("severity_1_crash: 1 files"));

    let dest = ws.path().join("classified");
    assert!(dest.join("severity_1_crash/op1_case_1/001.json").exists());
    assert!(dest.join("severity_0_no_error/op1_case_1/002.json").exists());
    assert!(dest.join("classification_report.json").exists());
}

#[test]
fn contract_isolate_skips_success_cases() {
    let ws = setup_workspace();
    seed_cases(ws.path());

    gnbt_cmd(ws.path())
        .args(["isolate", "op1_case_1", "errors"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Error cases copied: 2"))
        .stdout(predicate::str::contains("Success cases skipped: 1"));
    assert!(!ws.path().join("errors/002.json").exists());
}

#[test]
fn contract_organize_missing_source_fails() {
    let ws = setup_workspace();
    gnbt_cmd(ws.path())
        .args(["organize", "absent", "classified"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent"));
}

// =============================================================================
// categorize / breakdown
// =============================================================================

#[test]
fn contract_categorize_prints_csv() {
    let ws = setup_workspace();
    write_jsonl(&ws.path().join("rows.jsonl"));

    let output = gnbt_cmd(ws.path())
        .args(["categorize", "rows.jsonl"])
        .output()
        .expect("run gnbt");
    assert!(output.status.success());
    let text = stdout_of(&output);
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("Line,Category,Misconfigured_Param,Snippet"));
    assert_eq!(lines.count(), 2);
}

#[test]
fn contract_categorize_writes_files() {
    let ws = setup_workspace();
    write_jsonl(&ws.path().join("rows.jsonl"));

    gnbt_cmd(ws.path())
        .args(["categorize", "rows.jsonl", "--csv", "cats.csv", "--stats", "stats.txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("JSON Decode Error"));
    let csv = std::fs::read_to_string(ws.path().join("cats.csv")).expect("csv file");
    assert!(csv.contains("local_n_address"));
    assert!(ws.path().join("stats.txt").exists());
}

#[test]
fn contract_breakdown_counts_signatures() {
    let ws = setup_workspace();
    write_jsonl(&ws.path().join("rows.jsonl"));

    gnbt_cmd(ws.path())
        .args(["breakdown", "rows.jsonl", "--top", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--- CRASH BREAKDOWN ---"))
        .stdout(predicate::str::contains("Assertion: gtpInst > 0: 1"))
        .stdout(predicate::str::contains("Connection Refused: 1"));
}

#[test]
fn contract_unknown_subcommand_fails() {
    let ws = setup_workspace();
    gnbt_cmd(ws.path()).arg("frobnicate").assert().failure();
}
