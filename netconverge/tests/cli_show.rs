use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn show_prints_subnets_and_addresses() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("show")
        .arg(fixture("fixtures/lab.jsonc"))
        .assert()
        .success()
        .stdout(predicate::str::contains("domain=lan machines=4 router=router"))
        .stdout(predicate::str::contains("net=10.10.0.0/24 gateway=10.10.0.1"))
        .stdout(predicate::str::contains("- hv [server,hypervisor] vlan=server addr=10.10.0.2"))
        .stdout(predicate::str::contains("- alice [device,user,admin] vlan=admin addr=10.50.0.2"));
}

#[test]
fn show_needs_a_network_when_the_file_holds_several() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("show")
        .arg(fixture("fixtures/campus.jsonc"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("pick one with --network"));
}

#[test]
fn show_merges_included_network() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("show")
        .arg(fixture("fixtures/campus.jsonc"))
        .arg("--network")
        .arg("office")
        .assert()
        .success()
        .stdout(predicate::str::contains("domain=office.example"))
        .stdout(predicate::str::contains("- printer [device,internalonly] vlan=internalonly"));
}

#[test]
fn show_json_serializes_the_compiled_network() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("show")
        .arg(fixture("fixtures/lab.jsonc"))
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"topology\""))
        .stdout(predicate::str::contains("\"firewall\""));
}

#[test]
fn unknown_network_is_an_error() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("netconverge"));
    cmd.arg("show")
        .arg(fixture("fixtures/lab.jsonc"))
        .arg("--network")
        .arg("nope")
        .assert()
        .failure()
        .stderr(predicate::str::contains("network 'nope' not found"));
}
