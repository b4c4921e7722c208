//! Corruption recovery tests for the routine binary.
//!
//! These tests verify the system can handle:
//! - Corrupted library files
//! - Corrupted WAL and CSV files
//! - Partial writes
//! - Invalid input files and config

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cli(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("routine"));
    cmd.env("XDG_CONFIG_HOME", temp_dir.path().join("config"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

const SQUATS: &str = r#"[{
    "id": "squats",
    "title": "Squats",
    "exercises": [
        { "key": "back_squat", "series": [ { "reps": 5, "weight_kg": 100, "rest": "2:00" } ], "rest_after": "0:00" }
    ]
}]"#;

fn import_squats(temp_dir: &TempDir, data_dir: &Path) {
    let file = temp_dir.path().join("squats.json");
    fs::write(&file, SQUATS).unwrap();
    cli(temp_dir)
        .arg("--data-dir")
        .arg(data_dir)
        .arg("import")
        .arg(&file)
        .assert()
        .success();
}

fn run_squats(temp_dir: &TempDir, data_dir: &Path) {
    cli(temp_dir)
        .arg("--data-dir")
        .arg(data_dir)
        .args(["run", "squats", "--auto-complete"])
        .assert()
        .success();
}

fn wal_path(data_dir: &Path) -> PathBuf {
    data_dir.join("wal/routine_sessions.wal")
}

#[test]
fn test_corrupted_library_is_treated_as_empty() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("library.json"), "{ invalid json }}}}").unwrap();

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No routines in library"));
}

#[test]
fn test_import_repairs_corrupted_library() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(&data_dir).unwrap();
    fs::write(data_dir.join("library.json"), "\0\0garbage").unwrap();

    import_squats(&temp_dir, &data_dir);
    run_squats(&temp_dir, &data_dir);

    let library: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(data_dir.join("library.json")).unwrap())
            .expect("library should be valid JSON again");
    assert_eq!(library["routines"][0]["id"], "squats");
}

#[test]
fn test_corrupted_wal_file_ignored_during_read() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    fs::create_dir_all(data_dir.join("wal")).unwrap();
    fs::write(wal_path(&data_dir), "{ invalid json }\n{ more invalid }\n").unwrap();

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No sessions"));

    // New sessions are still appended after the bad lines
    import_squats(&temp_dir, &data_dir);
    run_squats(&temp_dir, &data_dir);

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Last 7 days: 1 sessions"));
}

#[test]
fn test_partial_wal_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    import_squats(&temp_dir, &data_dir);
    run_squats(&temp_dir, &data_dir);

    // Simulate a crash halfway through a second append
    {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(wal_path(&data_dir))
            .unwrap();
        write!(file, r#"{{"id":"00000000-0000-0000-0000-000000000000","routine_id":"squ"#).unwrap();
    }

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("rollup")
        .assert()
        .success()
        .stdout(predicate::str::contains("Rolled up 1 sessions"));

    let csv_content = fs::read_to_string(data_dir.join("sessions.csv")).unwrap();
    assert_eq!(csv_content.lines().count(), 2);
}

#[test]
fn test_corrupted_csv_rows_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    import_squats(&temp_dir, &data_dir);
    run_squats(&temp_dir, &data_dir);

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("rollup")
        .assert()
        .success();

    {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(data_dir.join("sessions.csv"))
            .unwrap();
        writeln!(file, "not-a-uuid,squats,Squats,,yesterday,1,1,0,0,0,10,5,quads").unwrap();
        writeln!(file, "truncated,row").unwrap();
    }

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("Last 7 days: 1 sessions"));
}

#[test]
fn test_missing_routine_file() {
    let temp_dir = setup_test_dir();
    cli(&temp_dir)
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("import")
        .arg(temp_dir.path().join("nope.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Io"));
}

#[test]
fn test_invalid_routine_file() {
    let temp_dir = setup_test_dir();
    let file = temp_dir.path().join("bad.json");
    fs::write(&file, r#"{"title": "no id or exercises"}"#).unwrap();

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("import")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse routines"));

    assert!(!temp_dir.path().join("library.json").exists());
}

#[test]
fn test_routine_without_series_refused() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("data");
    let file = temp_dir.path().join("empty.json");
    fs::write(
        &file,
        r#"{"id": "empty", "title": "Empty", "exercises": [{"key": "plank", "series": []}]}"#,
    )
    .unwrap();

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("import")
        .arg(&file)
        .assert()
        .success();

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(&data_dir)
        .args(["run", "empty", "--auto-complete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no series"));

    assert!(!wal_path(&data_dir).exists());
}

#[test]
fn test_invalid_config_fails_loudly() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config/routine");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[calories]\nepoc_multiplier = 0.2\n").unwrap();

    cli(&temp_dir)
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("epoc_multiplier"));
}
