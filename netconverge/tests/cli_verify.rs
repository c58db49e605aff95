use std::path::PathBuf;
use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn verify_passes_for_lab_fixture() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("verify")
        .arg(fixture("fixtures/lab.jsonc"))
        .assert()
        .success()
        .stdout(predicate::str::contains("verify network=lab machines=4"))
        .stdout(predicate::str::contains("result errors=0 warnings=0"));
}

#[test]
fn verify_reports_every_broken_reference() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("broken.json");
    fs::write(
        &input,
        r#"{"lab": {
            "servers": {
                "router": {"types": ["router"]},
                "hv": {"types": ["hypervisor"], "mac": "aa:bb:cc:00:00:10", "admins": ["bob"]},
                "websrv": {"types": ["service"], "hypervisor": "router",
                           "firewall": {"allow_ingress_from": ["nosuchbox"]}}
            }
        }}"#,
    )
    .expect("write");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("verify")
        .arg(path_as_str(&input))
        .assert()
        .failure()
        .stderr(predicate::str::contains("verify failed: 3 errors"))
        .stdout(predicate::str::contains("unknown_admin"))
        .stdout(predicate::str::contains("unknown_hypervisor"))
        .stdout(predicate::str::contains("unknown_target"))
        .stdout(predicate::str::contains("idle_hypervisor"));
}

#[test]
fn verify_strict_fails_on_warnings() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("idle.json");
    fs::write(
        &input,
        r#"{"lab": {"servers": {
            "router": {"types": ["router"]},
            "hv": {"types": ["hypervisor"], "mac": "aa:bb:cc:00:00:10"}
        }}}"#,
    )
    .expect("write");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("verify").arg(path_as_str(&input)).assert().success();

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("verify")
        .arg(path_as_str(&input))
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("strict mode"));
}

#[test]
fn verify_json_lists_one_report_per_network() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    let output = cmd
        .arg("verify")
        .arg(fixture("fixtures/campus.jsonc"))
        .arg("--format")
        .arg("json")
        .output()
        .expect("run");
    assert!(output.status.success());
    let reports: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    let networks: Vec<&str> = reports
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["network"].as_str().expect("network"))
        .collect();
    assert_eq!(networks, vec!["branch", "office"]);
}

fn path_as_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}
