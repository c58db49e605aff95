use pretty_assertions::assert_eq;
use script_doc::{parse, parse_file, render, write_file, ScriptNode};
use tempfile::tempdir;

fn sample() -> ScriptNode {
    let mut unit = ScriptNode::section("host_hostname").with_attr("phase", "persistent_config");
    unit.push(ScriptNode::comment("hostname matches label"));
    let mut check = ScriptNode::block("if [ \"$out\" = 'web' ]; then", "fi");
    check.push_line("host_hostname=1");
    check.push_line("cat > /etc/motd <<'NETCONVERGE_EOF'\nwelcome\nNETCONVERGE_EOF");
    unit.push(check);

    let mut doc = ScriptNode::document().with_text("#!/bin/sh");
    doc.push(ScriptNode::comment("header"))
        .push(ScriptNode::blank())
        .push(unit)
        .push(ScriptNode::line("echo done"));
    doc
}

#[test]
fn rendered_text_survives_parse_and_render() {
    let first = render(&sample());
    let reparsed = parse(first.as_bytes()).expect("parse");
    assert_eq!(render(&reparsed), first);
}

#[test]
fn file_round_trip_keeps_sections() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("audit.sh");
    write_file(&sample(), &path).expect("write");

    let doc = parse_file(&path).expect("parse");
    let unit = doc.get_child("host_hostname").expect("unit section");
    assert_eq!(
        unit.attributes.get("phase").map(String::as_str),
        Some("persistent_config")
    );
}
