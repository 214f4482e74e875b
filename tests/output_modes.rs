use assert_cmd::Command;
use serde_json::Value;

#[test]
fn kit_path_json_has_value_and_meta() {
    let dir = tempfile::tempdir().expect("temp dir");
    let kit = dir.path().join("somewhere/kit.json");

    let output = Command::cargo_bin("secq")
        .expect("binary exists")
        .env("SECQ_KIT", kit.to_str().unwrap())
        .args(["kit", "path", "--json"])
        .output()
        .expect("kit path output");

    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).expect("valid json");
    assert_eq!(json["value"], kit.display().to_string());
    assert_eq!(json["meta"]["kind"], "kit-path");
}

#[test]
fn kit_path_text_mode_prints_bare_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let kit = dir.path().join("kit.json");

    let output = Command::cargo_bin("secq")
        .expect("binary exists")
        .env("SECQ_KIT", kit.to_str().unwrap())
        .args(["kit", "path"])
        .output()
        .expect("kit path output");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end(), kit.display().to_string());
}

#[test]
fn kit_path_flag_overrides_environment() {
    let dir = tempfile::tempdir().expect("temp dir");
    let from_env = dir.path().join("env.json");
    let from_flag = dir.path().join("flag.json");

    let output = Command::cargo_bin("secq")
        .expect("binary exists")
        .env("SECQ_KIT", from_env.to_str().unwrap())
        .args(["kit", "path", "--kit", from_flag.to_str().unwrap()])
        .output()
        .expect("kit path output");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim_end(), from_flag.display().to_string());
}
