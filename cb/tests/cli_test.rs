//! CLI tests for the cb binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from any local or user config files
fn cb(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cb").expect("cb binary should build");
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_run_text_output() {
    let home = TempDir::new().unwrap();
    cb(&home)
        .args(["run", "alpha", "beta", "--latency-ms", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha -> "))
        .stdout(predicate::str::contains("ALPHA"))
        .stdout(predicate::str::contains("BETA"))
        .stdout(predicate::str::contains("Batches:"));
}

#[test]
fn test_run_json_output_preserves_key_order() {
    let home = TempDir::new().unwrap();
    let output = cb(&home)
        .args(["run", "c", "a", "b", "a", "--max-batch-size", "2", "--latency-ms", "50", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = report["results"].as_array().unwrap();
    let pairs: Vec<(&str, &str)> = results
        .iter()
        .map(|r| (r["key"].as_str().unwrap(), r["value"].as_str().unwrap()))
        .collect();
    assert_eq!(pairs, vec![("c", "C"), ("a", "A"), ("b", "B"), ("a", "A")]);

    let batches = report["batches"].as_array().unwrap();
    assert!(batches.iter().all(|b| b.as_u64().unwrap() <= 2));
}

#[test]
fn test_run_reads_keys_from_stdin() {
    let home = TempDir::new().unwrap();
    cb(&home)
        .args(["run", "--latency-ms", "1"])
        .write_stdin("one\n\ntwo\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("ONE"))
        .stdout(predicate::str::contains("TWO"));
}

#[test]
fn test_run_rejects_zero_batch_size() {
    let home = TempDir::new().unwrap();
    cb(&home)
        .args(["run", "x", "--max-batch-size", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid batcher options"));
}

#[test]
fn test_config_prints_effective_settings() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.yml");
    std::fs::write(&path, "batcher:\n  max-batch-size: 7\n  delay-ms: 3\n").unwrap();

    cb(&home)
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-batch-size: 7"))
        .stdout(predicate::str::contains("delay-ms: 3"));
}

#[test]
fn test_local_config_file_is_used() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("coalesce.yml"), "batcher:\n  max-queue-size: 12\n").unwrap();

    cb(&home)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max-queue-size: 12"));
}

#[test]
fn test_missing_explicit_config_fails() {
    let home = TempDir::new().unwrap();
    cb(&home)
        .args(["--config", "does-not-exist.yml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
