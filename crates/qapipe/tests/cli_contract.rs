use assert_cmd::Command;
use predicates::prelude::*;

fn qapipe() -> Command {
    Command::cargo_bin("qapipe").expect("binary builds")
}

#[test]
fn version_json_reports_name_and_version() {
    let out = qapipe().arg("version").output().expect("runs");
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json stdout");
    assert_eq!(v["name"].as_str(), Some("qapipe"));
    assert_eq!(v["version"].as_str(), Some(env!("CARGO_PKG_VERSION")));
}

#[test]
fn version_text_is_human_readable() {
    qapipe()
        .args(["version", "--output", "text"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("qapipe "));
}

#[test]
fn calc_evaluates_expressions() {
    qapipe()
        .args(["calc", "2 + 3 * 4"])
        .assert()
        .success()
        .stdout(predicate::str::contains("14"));
}

#[test]
fn calc_rejects_non_arithmetic_input() {
    qapipe().args(["calc", "rm -rf /"]).assert().failure();
}

#[test]
fn doctor_reports_without_leaking_values() {
    let out = qapipe()
        .arg("doctor")
        .env("QAPIPE_TAVILY_API_KEY", "super-secret-value")
        .output()
        .expect("runs");
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let v: serde_json::Value = serde_json::from_str(&stdout).expect("json stdout");
    assert_eq!(v["tavily_key"].as_bool(), Some(true));
    assert!(!stdout.contains("super-secret-value"));
}

#[test]
fn batch_without_configuration_fails_fast() {
    qapipe()
        .arg("batch")
        .env_remove("QAPIPE_BENCH_API_URL")
        .env_remove("QAPIPE_ENV_FILE")
        .assert()
        .failure()
        .stderr(predicate::str::contains("QAPIPE_BENCH_API_URL"));
}
