//! Integration tests for the bp binary.
//!
//! These tests verify end-to-end behavior including:
//! - The guided measurement session
//! - History listing
//! - CSV export

use assert_cmd::Command;
use bp_core::store::{JsonlRecordStore, RecordStore};
use bp_core::{Measurement, SavedRecord};
use chrono::{Duration, Utc};
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("bp"))
}

/// Seed the data directory with saved records through the core store
fn seed_records(data_dir: &std::path::Path, count: usize) {
    let mut store = JsonlRecordStore::new(data_dir.join("records.jsonl"));
    for i in 0..count {
        let m = Measurement {
            systolic: 120.0 + i as f64,
            diastolic: 80.0,
            pulse: 70.0,
        };
        let record =
            SavedRecord::average_of(&[m, m, m], Utc::now() - Duration::days((count - i) as i64));
        store.add_record(&record).expect("Failed to seed record");
    }
}

/// Config with countdowns short enough for a test session
fn write_fast_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    fs::write(
        &path,
        "[protocol]\nprep_seconds = 1\ncooldown_seconds = 1\n",
    )
    .expect("Failed to write config");
    path
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Blood pressure measurement journal"));
}

#[test]
fn test_history_with_no_records() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No records yet"));
}

#[test]
fn test_history_lists_seeded_records() {
    let temp_dir = setup_test_dir();
    seed_records(temp_dir.path(), 2);

    cli()
        .arg("history")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved records (2)"))
        .stdout(predicate::str::contains("120/80"))
        .stdout(predicate::str::contains("121/80"));
}

#[test]
fn test_export_writes_csv() {
    let temp_dir = setup_test_dir();
    seed_records(temp_dir.path(), 3);

    cli()
        .arg("export")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 3 records"));

    let csv = fs::read_to_string(temp_dir.path().join("records.csv")).unwrap();
    assert!(csv.starts_with("id,timestamp"));
    assert_eq!(csv.lines().count(), 4);
}

#[test]
fn test_measure_session_rested_path() {
    let temp_dir = setup_test_dir();
    let config_path = write_fast_config(temp_dir.path());

    // Already rested, then three readings with a 1s cooldown between them
    cli()
        .arg("measure")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .write_stdin("y\n120\n80\n70\n122\n82\n72\n121\n81\n71\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Reading 1 of 3"))
        .stdout(predicate::str::contains("Reading 3 of 3"))
        .stdout(predicate::str::contains("AVERAGE OF THREE READINGS"))
        .stdout(predicate::str::contains("Record saved to history"));

    // The averaged record landed in the store
    let contents = fs::read_to_string(temp_dir.path().join("records.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains("\"systolic\":121"));
    assert!(contents.contains("\"diastolic\":81"));
    assert!(contents.contains("\"pulse\":71"));
    assert!(contents.contains("\"id\":1"));
}

#[test]
fn test_measure_rejects_invalid_reading_and_reprompts() {
    let temp_dir = setup_test_dir();
    let config_path = write_fast_config(temp_dir.path());

    // First attempt has systolic <= diastolic and is re-entered
    cli()
        .arg("measure")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--config")
        .arg(&config_path)
        .write_stdin("y\n80\n120\n70\n120\n80\n70\n122\n82\n72\n121\n81\n71\n")
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Systolic must exceed diastolic"))
        .stdout(predicate::str::contains("Record saved to history"));

    let contents = fs::read_to_string(temp_dir.path().join("records.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 1);
}
