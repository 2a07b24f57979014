//! CLI integration tests using assert_cmd.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn examprep() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("examprep").unwrap();
    cmd.env_remove("EXAMPREP_OUTBOX_DIR");
    cmd
}

fn write_config(dir: &Path, tick_ms: u64) -> std::path::PathBuf {
    let path = dir.join("examprep.toml");
    std::fs::write(
        &path,
        format!(
            "tick_ms = {tick_ms}\n\n[sink]\ntype = \"outbox\"\ndir = \"{}\"\n",
            dir.join("outbox").display()
        ),
    )
    .unwrap();
    path
}

fn outbox_files(dir: &Path) -> Vec<std::path::PathBuf> {
    match std::fs::read_dir(dir.join("outbox")) {
        Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(_) => vec![],
    }
}

#[test]
fn validate_valid_test() {
    examprep()
        .arg("validate")
        .arg("--test")
        .arg("../../test-defs/physics-mock.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("Physics Mock 1 (4 questions, 20 min, mock)"))
        .stdout(predicate::str::contains("All tests valid"));
}

#[test]
fn validate_directory() {
    examprep()
        .arg("validate")
        .arg("--test")
        .arg("../../test-defs")
        .assert()
        .success()
        .stdout(predicate::str::contains("Physics Mock 1"))
        .stdout(predicate::str::contains("Periodic Table Chapter Test"));
}

#[test]
fn validate_reports_warnings() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("thin.json");
    std::fs::write(
        &path,
        r#"{"id": "thin", "name": "Thin", "type": "practice", "duration_minutes": 5,
            "questions": [{"id": "q1", "text": "Only one option?",
                           "options": [{"id": "a", "text": "Yes", "is_correct": true}]}]}"#,
    )
    .unwrap();

    examprep()
        .arg("validate")
        .arg("--test")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("[q1] WARNING"))
        .stdout(predicate::str::contains("1 warning(s) found"));
}

#[test]
fn validate_nonexistent_file() {
    examprep()
        .arg("validate")
        .arg("--test")
        .arg("nonexistent.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn validate_missing_field_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{"id": "b", "name": "Broken", "type": "mock", "questions": []}"#)
        .unwrap();

    examprep()
        .arg("validate")
        .arg("--test")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("duration_minutes"));
}

#[test]
fn init_creates_files() {
    let dir = TempDir::new().unwrap();

    examprep()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created examprep.toml"))
        .stdout(predicate::str::contains("Created test-defs/sample.json"));

    assert!(dir.path().join("examprep.toml").exists());
    assert!(dir.path().join("test-defs/sample.json").exists());

    examprep()
        .current_dir(dir.path())
        .arg("validate")
        .arg("--test")
        .arg("test-defs/sample.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("All tests valid"));
}

#[test]
fn init_skips_existing() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("examprep.toml"), "# mine\n").unwrap();

    examprep()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("examprep.toml already exists"));

    let content = std::fs::read_to_string(dir.path().join("examprep.toml")).unwrap();
    assert_eq!(content, "# mine\n");
}

#[test]
fn take_and_submit_writes_outbox() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), 1000);
    let saved = dir.path().join("attempt.json");

    examprep()
        .arg("take")
        .arg("--test")
        .arg("../../test-defs/physics-mock.json")
        .arg("--config")
        .arg(&config)
        .arg("--save")
        .arg(&saved)
        .write_stdin("s 11\nnext\ns 2\nr\nstatus\nsubmit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Question 1/4"))
        .stdout(predicate::str::contains("Selected 22."))
        .stdout(predicate::str::contains("Score:      1/4 (25%)"))
        .stdout(predicate::str::contains("Points:     4/16"))
        .stdout(predicate::str::contains("delivered"));

    let files = outbox_files(dir.path());
    assert_eq!(files.len(), 1);

    let payload: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(payload["testId"], "9001");
    assert_eq!(payload["trigger"], "manual");
    assert_eq!(payload["result"]["score"], 1);
    assert!(saved.exists());
}

#[test]
fn take_quit_submits_nothing() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), 1000);

    examprep()
        .arg("take")
        .arg("--test")
        .arg("../../test-defs/chemistry-chapter.json")
        .arg("--config")
        .arg(&config)
        .write_stdin("s c1-a\nquit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing submitted"));

    assert!(outbox_files(dir.path()).is_empty());
}

#[test]
fn review_payload_with_breakdown() {
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), 1000);
    let saved = dir.path().join("attempt.json");

    examprep()
        .arg("take")
        .arg("--test")
        .arg("../../test-defs/chemistry-chapter.json")
        .arg("--config")
        .arg(&config)
        .arg("--save")
        .arg(&saved)
        .write_stdin("s c1-a\nsubmit\n")
        .assert()
        .success();

    examprep()
        .arg("review")
        .arg("--result")
        .arg(&saved)
        .arg("--test")
        .arg("../../test-defs/chemistry-chapter.json")
        .assert()
        .success()
        .stdout(predicate::str::contains("Periodic Table Chapter Test"))
        .stdout(predicate::str::contains("Chemistry"))
        .stdout(predicate::str::contains("Score:      1/2 (50%)"));

    examprep()
        .arg("review")
        .arg("--result")
        .arg(&saved)
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"testId\": \"chem-periodic\""));
}

#[test]
fn review_rejects_inconsistent_payload() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tampered.json");
    std::fs::write(
        &path,
        r#"{
            "attemptId": "6f1c2a4e-8b1d-4c55-9a3e-2f7d9b0c1a11",
            "testId": "t1",
            "trigger": "manual",
            "submittedAt": "2026-01-01T00:00:00Z",
            "result": {
                "testId": "t1",
                "score": 1,
                "totalQuestions": 1,
                "percentage": 100,
                "points": 4,
                "timeSpentSecs": 30,
                "answers": [{"questionId": "q1", "selectedOptionId": null, "isCorrect": true}]
            }
        }"#,
    )
    .unwrap();

    examprep()
        .arg("review")
        .arg("--result")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("inconsistent submission"));
}
