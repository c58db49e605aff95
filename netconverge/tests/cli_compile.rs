use std::path::PathBuf;
use std::{fs, path::Path};

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn netconverge() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("netconverge"))
}

#[test]
fn compile_writes_every_mode_for_every_managed_machine() {
    let dir = tempdir().expect("tempdir");
    netconverge()
        .arg("compile")
        .arg(fixture("fixtures/lab.jsonc"))
        .arg("--out")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("router.config.sh"))
        .stdout(predicate::str::contains("scripts=9"));

    let mut names: Vec<String> = fs::read_dir(dir.path().join("lab"))
        .expect("lab dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec![
            "hv.audit.sh",
            "hv.config.sh",
            "hv.dryrun.sh",
            "router.audit.sh",
            "router.config.sh",
            "router.dryrun.sh",
            "websrv.audit.sh",
            "websrv.config.sh",
            "websrv.dryrun.sh",
        ]
    );

    let router = fs::read_to_string(dir.path().join("lab/router.config.sh")).expect("read");
    assert!(router.starts_with("#!/bin/sh\n"));
    assert!(router.contains("CONFIGURING: "));
    let audit = fs::read_to_string(dir.path().join("lab/router.audit.sh")).expect("read");
    assert!(!audit.contains("CONFIGURING: "));
}

#[test]
fn compile_is_byte_identical_across_runs() {
    let first = tempdir().expect("tempdir");
    let second = tempdir().expect("tempdir");
    for out in [first.path(), second.path()] {
        netconverge()
            .arg("compile")
            .arg(fixture("fixtures/lab.jsonc"))
            .arg("--out")
            .arg(out)
            .assert()
            .success();
    }
    for name in ["router.config.sh", "hv.dryrun.sh", "websrv.audit.sh"] {
        let a = fs::read(first.path().join("lab").join(name)).expect("first");
        let b = fs::read(second.path().join("lab").join(name)).expect("second");
        assert_eq!(a, b, "{name} differs between runs");
    }
}

#[test]
fn compile_can_select_one_machine_and_mode() {
    let dir = tempdir().expect("tempdir");
    netconverge()
        .arg("compile")
        .arg(fixture("fixtures/lab.jsonc"))
        .arg("--out")
        .arg(dir.path())
        .arg("--machine")
        .arg("websrv")
        .arg("--mode")
        .arg("audit")
        .assert()
        .success()
        .stdout(predicate::str::contains("scripts=1"));

    assert!(dir.path().join("lab/websrv.audit.sh").exists());
    assert!(!dir.path().join("lab/websrv.config.sh").exists());
    assert!(!dir.path().join("lab/router.audit.sh").exists());
}

#[test]
fn compile_rejects_unmanaged_machine() {
    let dir = tempdir().expect("tempdir");
    netconverge()
        .arg("compile")
        .arg(fixture("fixtures/lab.jsonc"))
        .arg("--out")
        .arg(dir.path())
        .arg("--machine")
        .arg("alice")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a managed machine"));
}

#[test]
fn compile_uses_passphrases_from_secrets_file() {
    let dir = tempdir().expect("tempdir");
    let secrets = dir.path().join("secrets.json");
    fs::write(&secrets, r#"{"servers": {"hv": "s3cret"}}"#).expect("write");
    let out = dir.path().join("out");

    netconverge()
        .arg("compile")
        .arg(fixture("fixtures/lab.jsonc"))
        .arg("--out")
        .arg(&out)
        .arg("--secrets")
        .arg(&secrets)
        .assert()
        .success();

    let hv = fs::read_to_string(out.join("lab/hv.config.sh")).expect("read");
    assert!(hv.contains("alice:s3cret"));
}

#[test]
fn compile_selects_network_and_resolves_includes() {
    let dir = tempdir().expect("tempdir");
    netconverge()
        .arg("compile")
        .arg(fixture("fixtures/campus.jsonc"))
        .arg("--out")
        .arg(dir.path())
        .arg("--network")
        .arg("office")
        .assert()
        .success();

    assert!(dir.path().join("office/edge.config.sh").exists());
    assert!(dir.path().join("office/files.config.sh").exists());
    assert!(!dir.path().join("branch").exists());
}

#[test]
fn compile_writes_nothing_for_a_failing_network() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("broken.json");
    fs::write(
        &input,
        r#"{"lab": {"servers": {
            "router": {"types": ["router"]},
            "websrv": {"types": ["service"], "hypervisor": "nowhere"}
        }}}"#,
    )
    .expect("write");
    let out = dir.path().join("out");

    netconverge()
        .arg("compile")
        .arg(path_as_str(&input))
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("network 'lab'"))
        .stderr(predicate::str::contains("nowhere"));
    assert!(!out.join("lab").exists());
}

#[test]
fn compile_refuses_to_overwrite_input() {
    let dir = tempdir().expect("tempdir");
    let input = dir.path().join("lab.jsonc");
    fs::copy(fixture("fixtures/lab.jsonc"), &input).expect("copy");

    netconverge()
        .arg("compile")
        .arg(path_as_str(&input))
        .arg("--out")
        .arg(path_as_str(&input))
        .assert()
        .failure()
        .stderr(predicate::str::contains("refusing to write scripts over the input"));
}

fn path_as_str(path: &Path) -> &str {
    path.to_str().expect("utf8 path")
}
