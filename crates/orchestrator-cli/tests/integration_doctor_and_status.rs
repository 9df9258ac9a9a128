//! End-to-end CLI smoke tests driving the built `orchestrator` binary
//! against a small bootstrap recipe set on disk.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn write_fleet(dir: &TempDir) -> std::path::PathBuf {
    let fleet = dir.path().join("fleet.toml");
    fs::write(
        &fleet,
        r#"
targets = ["web"]

[components.db]
[components.db.lifecycle]
install = "true"
startup = "true"

[components.web]
dependencies = "db:running"
[components.web.lifecycle]
install = "true"
startup = "true"
"#,
    )
    .unwrap();
    fleet
}

#[test]
fn doctor_reports_detected_platform_tags_without_a_config() {
    let mut cmd = Command::cargo_bin("orchestrator").unwrap();
    cmd.arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("detected platform tags"));
}

#[test]
fn doctor_starts_a_fleet_and_reports_overall_health() {
    let temp_dir = TempDir::new().unwrap();
    let fleet = write_fleet(&temp_dir);

    let mut cmd = Command::cargo_bin("orchestrator").unwrap();
    cmd.args(["doctor", "--config", fleet.to_str().unwrap(), "--settle-ms", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("overall:"));
}

#[test]
fn status_reports_every_component_in_the_fleet() {
    let temp_dir = TempDir::new().unwrap();
    let fleet = write_fleet(&temp_dir);

    let mut cmd = Command::cargo_bin("orchestrator").unwrap();
    cmd.args(["status", "--config", fleet.to_str().unwrap(), "--settle-ms", "200"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"db\""))
        .stdout(predicate::str::contains("\"web\""));
}

#[test]
fn start_brings_up_a_single_named_component_and_its_dependency() {
    let temp_dir = TempDir::new().unwrap();
    let fleet = write_fleet(&temp_dir);

    let mut cmd = Command::cargo_bin("orchestrator").unwrap();
    cmd.args(["start", "--config", fleet.to_str().unwrap(), "web"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"web\""));
}
