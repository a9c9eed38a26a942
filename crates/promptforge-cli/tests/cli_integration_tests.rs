//! Integration tests driving the `promptforge` binary end to end.

use assert_cmd::Command;
use predicates::prelude::*;
use promptforge_test_utils::sample_template;
use std::io::Write;

fn write_json(dir: &assert_fs::TempDir, name: &str, value: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(serde_json::to_string_pretty(value).unwrap().as_bytes()).unwrap();
    path
}

#[test]
fn render_substitutes_context_into_the_template() {
    let dir = assert_fs::TempDir::new().unwrap();
    let template_path = dir.path().join("greeting.tmpl");
    std::fs::write(&template_path, "Hello {{name}}!").unwrap();
    let context_path = write_json(&dir, "context.json", &serde_json::json!({ "name": "Ada" }));

    Command::cargo_bin("promptforge")
        .unwrap()
        .arg("render")
        .arg(&template_path)
        .arg("--context-file")
        .arg(&context_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello Ada!"));
}

#[test]
fn validate_reports_a_missing_required_variable() {
    let dir = assert_fs::TempDir::new().unwrap();
    let template = serde_json::to_value(sample_template()).unwrap();
    let template_path = write_json(&dir, "template.json", &template);

    Command::cargo_bin("promptforge")
        .unwrap()
        .arg("validate")
        .arg(&template_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("validation error"));
}

#[test]
fn queue_stats_on_a_fresh_invocation_reports_zero_pending_jobs() {
    Command::cargo_bin("promptforge")
        .unwrap()
        .arg("queue-stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"pending\": 0"));
}
