// End-to-end runs of the `elklens` binary against a throwaway database

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

/// Command with a scratch database and no provider credentials.
fn elklens_command(workdir: &Path, args: &[&str]) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_elklens"));
    command
        .args(args)
        .current_dir(workdir)
        .env("ELKLENS_DATABASE_PATH", workdir.join("elklens.db"))
        .env_remove("ELKLENS_CONFIG")
        .env_remove("ELKLENS_PROVIDER")
        .env_remove("OPENAI_API_KEY")
        .env_remove("ANTHROPIC_API_KEY")
        .env_remove("ELKLENS_WEBHOOK_URL")
        .env("RUST_LOG", "warn");
    command
}

fn elklens(workdir: &Path, args: &[&str]) -> Output {
    elklens_command(workdir, args)
        .env("ELKLENS_PROVIDER", "heuristic")
        .output()
        .expect("failed to run elklens")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

#[test]
fn test_analyze_then_get_analysis() {
    let dir = tempdir().unwrap();

    let analyzed = elklens(
        dir.path(),
        &["analyze", "--prompt", "Connection refused", "--context", "{\"file\": \"/path/to/file.php\"}"],
    );
    assert!(analyzed.status.success(), "{}", String::from_utf8_lossy(&analyzed.stderr));
    let report = stdout_json(&analyzed);
    assert_eq!(report["total_errors"], 1);
    let batch_id = report["batch_id"].as_str().unwrap().to_string();

    let fetched = elklens(dir.path(), &["get-analysis", &batch_id]);
    assert!(fetched.status.success());
    assert_eq!(stdout_json(&fetched), report);
}

#[test]
fn test_output_file() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("report.json");

    let run = elklens(
        dir.path(),
        &["analyze", "-p", "Why is the queue stuck?", "-o", out.to_str().unwrap()],
    );
    assert!(run.status.success());
    assert!(run.stdout.is_empty());

    let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(written["summary"]["low_severity"], 1);
}

#[test]
fn test_ingest_file_and_rerun() {
    let dir = tempdir().unwrap();
    let hits = dir.path().join("hits.json");
    std::fs::write(
        &hits,
        r#"[{"_index": "laravel", "_id": "1", "elk_id": 77, "_source": {
            "message": "SQLSTATE[HY000] [2002] Connection refused",
            "@timestamp": "2024-03-01T10:00:00Z",
            "level_name": "ERROR",
            "file": "/var/www/app/Db.php"}}]"#,
    )
    .unwrap();

    let ingested = elklens(dir.path(), &["ingest", "--file", hits.to_str().unwrap()]);
    assert!(ingested.status.success(), "{}", String::from_utf8_lossy(&ingested.stderr));
    let report = stdout_json(&ingested);
    assert_eq!(report["elk_ids"], serde_json::json!(["77"]));
    assert_eq!(report["summary"]["critical_files"][0]["file"], "/var/www/app/Db.php");

    let batch_id = report["batch_id"].as_str().unwrap();
    let rerun = elklens(dir.path(), &["rerun", batch_id]);
    assert!(rerun.status.success());
    assert_eq!(stdout_json(&rerun)["summary"], report["summary"]);

    let results = elklens(dir.path(), &["get-results", batch_id]);
    assert_eq!(stdout_json(&results).as_array().unwrap().len(), 1);
}

#[test]
fn test_failures_have_distinct_exit_codes() {
    let dir = tempdir().unwrap();

    let missing = elklens(dir.path(), &["get-analysis", "nonexistent"]);
    assert_eq!(missing.status.code(), Some(6));
    assert!(missing.stdout.is_empty());

    let blank = elklens(dir.path(), &["analyze", "--prompt", "   "]);
    assert_eq!(blank.status.code(), Some(2));

    let bad_config = elklens(dir.path(), &["--config", "does-not-exist.toml", "get-analysis", "x"]);
    assert_eq!(bad_config.status.code(), Some(8));
}

#[test]
fn test_lookups_need_no_provider_credentials() {
    let dir = tempdir().unwrap();

    let missing = elklens_command(dir.path(), &["get-analysis", "nonexistent"])
        .output()
        .unwrap();
    assert_eq!(missing.status.code(), Some(6), "{}", String::from_utf8_lossy(&missing.stderr));

    let results = elklens_command(dir.path(), &["get-results", "nonexistent"])
        .output()
        .unwrap();
    assert_eq!(results.status.code(), Some(6));

    let analyze = elklens_command(dir.path(), &["analyze", "--prompt", "Connection refused"])
        .output()
        .unwrap();
    assert_eq!(analyze.status.code(), Some(8));
}

#[test]
fn test_ingest_with_instruction_prompt() {
    let dir = tempdir().unwrap();
    let hits = dir.path().join("hits.json");
    std::fs::write(
        &hits,
        r#"[{"elk_id": "elk-3", "_source": {
            "message": "Connection refused",
            "@timestamp": "2024-03-01T10:00:00Z",
            "level": "ERROR",
            "file": "/var/www/app/Queue.php"}}]"#,
    )
    .unwrap();

    let ingested = elklens(
        dir.path(),
        &["ingest", "--file", hits.to_str().unwrap(), "--prompt", "Why does the queue fail?"],
    );
    assert!(ingested.status.success(), "{}", String::from_utf8_lossy(&ingested.stderr));
    let report = stdout_json(&ingested);
    assert_eq!(report["elk_ids"], serde_json::json!(["elk-3"]));

    let batch_id = report["batch_id"].as_str().unwrap();
    let results = stdout_json(&elklens(dir.path(), &["get-results", batch_id]));
    assert!(!results[0]["code_suggestions"].as_array().unwrap().is_empty());
    assert!(!results[0]["suggestions"].as_array().unwrap().is_empty());
}
