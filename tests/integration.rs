use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn triage_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("triage");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let data_dir = root.join("data");
    fs::create_dir_all(&data_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/triage.sqlite"

[classifier]
provider = "disabled"

[generator]
count = 25

[triage]
activity_window = 50

[server]
bind = "127.0.0.1:7431"
"#,
        root.display()
    );

    let config_path = config_dir.join("triage.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_triage(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = triage_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run triage binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_triage(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_triage(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_triage(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_run_generates_and_reports() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    let (stdout, stderr, success) = run_triage(&config_path, &["run", "--count", "20"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("feedback items: 20"));
    assert!(stdout.contains("clusters:"));
    assert!(stdout.contains("escalated:"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_run_dry_run_writes_nothing() {
    let (tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    let (stdout, _, success) = run_triage(&config_path, &["run", "--count", "10", "--dry-run"]);
    assert!(success);
    assert!(stdout.contains("dry-run"));
    assert!(stdout.contains("feedback items: 10"));

    // Nothing persisted: report should still be empty.
    let (stdout, _, _) = run_triage(&config_path, &["report"]);
    assert!(stdout.contains("No reports yet"));

    drop(tmp);
}

#[test]
fn test_ingest_jsonl_file() {
    let (tmp, config_path) = setup_test_env();

    let feedback_path = tmp.path().join("feedback.jsonl");
    fs::write(
        &feedback_path,
        r#"{"source": "chat", "text": "Site is completely down!"}
{"source": "forum", "text": "Love the new dashboard!"}
{"source": "code-forge", "text": "Found a bug in the export flow"}
"#,
    )
    .unwrap();

    run_triage(&config_path, &["init"]);
    let (stdout, stderr, success) =
        run_triage(&config_path, &["ingest", feedback_path.to_str().unwrap()]);
    assert!(
        success,
        "ingest failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("feedback items: 3"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_ingest_empty_file_produces_empty_report() {
    let (tmp, config_path) = setup_test_env();

    let feedback_path = tmp.path().join("empty.jsonl");
    fs::write(&feedback_path, "").unwrap();

    run_triage(&config_path, &["init"]);
    let (stdout, _, success) =
        run_triage(&config_path, &["ingest", feedback_path.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("feedback items: 0"));

    let (stdout, _, _) = run_triage(&config_path, &["report"]);
    assert!(stdout.contains(
        "Daily Triage Report: 0 feedback items processed, 0 clusters identified, 0 escalated."
    ));
}

#[test]
fn test_ingest_rejects_unknown_source() {
    let (tmp, config_path) = setup_test_env();

    let feedback_path = tmp.path().join("bad.jsonl");
    fs::write(&feedback_path, r#"{"source": "carrier-pigeon", "text": "hi"}"#).unwrap();

    run_triage(&config_path, &["init"]);
    let (_, _, success) = run_triage(&config_path, &["ingest", feedback_path.to_str().unwrap()]);
    assert!(!success, "ingest should reject unknown sources");
}

#[test]
fn test_report_after_run() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    run_triage(&config_path, &["run", "--count", "30"]);

    let (stdout, stderr, success) = run_triage(&config_path, &["report"]);
    assert!(
        success,
        "report failed: stdout={}, stderr={}",
        stdout, stderr
    );
    assert!(stdout.contains("Daily Triage Report: 30 feedback items processed"));
    assert!(stdout.contains("CLUSTER"));
}

#[test]
fn test_report_without_runs() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    let (stdout, _, success) = run_triage(&config_path, &["report"]);
    assert!(success);
    assert!(stdout.contains("No reports yet"));
}

#[test]
fn test_dashboard_json_shape() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    run_triage(&config_path, &["run", "--count", "15"]);

    let (stdout, stderr, success) = run_triage(&config_path, &["dashboard", "--json"]);
    assert!(
        success,
        "dashboard failed: stdout={}, stderr={}",
        stdout, stderr
    );

    let view: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(view["stats"]["total_feedback"], 15);
    assert_eq!(view["sentiment_trend"].as_array().unwrap().len(), 7);
    assert_eq!(view["volume_trend"].as_array().unwrap().len(), 7);
    assert!(view["recent_activity"].as_array().unwrap().len() <= 15);

    // All 15 generated items land in the trailing 24 hours, so the
    // non-synthetic volume buckets account for every one of them.
    let real_volume: f64 = view["volume_trend"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|p| p["synthetic"] == false)
        .map(|p| p["value"].as_f64().unwrap())
        .sum();
    assert_eq!(real_volume, 15.0);
}

#[test]
fn test_dashboard_on_empty_database() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    let (stdout, _, success) = run_triage(&config_path, &["dashboard", "--json"]);
    assert!(success);

    let view: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(view["stats"]["total_feedback"], 0);
    assert_eq!(view["stats"]["avg_sentiment"], 0.0);
    // Trends still span seven days, filled with flagged synthetic points.
    assert_eq!(view["sentiment_trend"].as_array().unwrap().len(), 7);
}

#[test]
fn test_stats_output() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    run_triage(&config_path, &["run", "--count", "12"]);

    let (stdout, stderr, success) = run_triage(&config_path, &["stats"]);
    assert!(success, "stats failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Feedback:    12"));
    assert!(stdout.contains("Reports:     1"));
    assert!(stdout.contains("By source:"));
}

#[test]
fn test_invalid_classifier_provider_rejected() {
    let (tmp, config_path) = setup_test_env();

    let bad_config = config_path.with_file_name("bad.toml");
    fs::write(
        &bad_config,
        format!(
            r#"[db]
path = "{}/data/triage.sqlite"

[classifier]
provider = "oracle"

[server]
bind = "127.0.0.1:7431"
"#,
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_triage(&bad_config, &["init"]);
    assert!(!success, "unknown provider should fail config validation");
    assert!(stderr.contains("provider"));
}

#[test]
fn test_repeated_runs_accumulate_feedback() {
    let (_tmp, config_path) = setup_test_env();

    run_triage(&config_path, &["init"]);
    run_triage(&config_path, &["run", "--count", "10"]);
    run_triage(&config_path, &["run", "--count", "10"]);

    let (stdout, _, _) = run_triage(&config_path, &["stats"]);
    assert!(stdout.contains("Feedback:    20"));

    // The latest report covers only the most recent run.
    let (stdout, _, _) = run_triage(&config_path, &["report"]);
    assert!(stdout.contains("10 feedback items processed"));
}
