use assert_cmd::Command;
use predicates::str::contains;
use serde_json::json;
use std::fs;

#[test]
fn no_command_prints_help_with_usage_exit() {
    Command::cargo_bin("secq")
        .expect("binary exists")
        .assert()
        .failure()
        .code(64)
        .stdout(contains("Usage"));
}

#[test]
fn missing_question_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    Command::cargo_bin("secq")
        .expect("binary exists")
        .env("SECQ_TEST_KDF", "1")
        .args([
            "kit",
            "build",
            "--questions",
            dir.path().join("absent.json").to_str().unwrap(),
            "--kit",
            dir.path().join("kit.json").to_str().unwrap(),
            "--threshold",
            "2",
            "--allow-weak",
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn weak_geometry_without_override_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let questions = dir.path().join("questions.json");
    fs::write(
        &questions,
        json!([
            {"id": 1, "text": "Q?", "alternatives": ["a", "b"], "correct_answers": ["a", "b"]}
        ])
        .to_string(),
    )
    .unwrap();

    Command::cargo_bin("secq")
        .expect("binary exists")
        .env("SECQ_TEST_KDF", "1")
        .args([
            "kit",
            "build",
            "--questions",
            questions.to_str().unwrap(),
            "--kit",
            dir.path().join("kit.json").to_str().unwrap(),
            "--threshold",
            "2",
        ])
        .write_stdin("secret\nsecret\n")
        .assert()
        .failure()
        .code(64)
        .stderr(contains("floor"));
}

#[test]
fn recover_against_missing_kit_is_an_io_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let answers = dir.path().join("answers.json");
    fs::write(&answers, "[]").unwrap();

    Command::cargo_bin("secq")
        .expect("binary exists")
        .args([
            "kit",
            "recover",
            "--kit",
            dir.path().join("absent.json").to_str().unwrap(),
            "--answers",
            answers.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn mismatched_secret_confirmation_is_a_usage_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let questions = dir.path().join("questions.json");
    fs::write(
        &questions,
        json!([
            {"id": 1, "text": "Q?", "alternatives": ["a", "b"], "correct_answers": ["a"]}
        ])
        .to_string(),
    )
    .unwrap();

    Command::cargo_bin("secq")
        .expect("binary exists")
        .env("SECQ_TEST_KDF", "1")
        .args([
            "kit",
            "build",
            "--questions",
            questions.to_str().unwrap(),
            "--kit",
            dir.path().join("kit.json").to_str().unwrap(),
            "--threshold",
            "1",
            "--allow-weak",
        ])
        .write_stdin("one\ntwo\n")
        .assert()
        .failure()
        .code(64)
        .stderr(contains("do not match"));
}
