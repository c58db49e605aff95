//! Unit list to shell script.

use std::collections::BTreeSet;

use script_doc::{shell_quote, ScriptNode};

use crate::compiler::Mode;
use crate::error::CompileError;
use crate::unit::{is_shell_identifier, Polarity, Unit, PROCEED};

pub const HEADER: &str = "header";
pub const FOOTER: &str = "footer";
const OUTPUT_VAR: &str = "nc_out";

/// Reject unit lists no script could render correctly.
pub fn check_units(machine: &str, units: &[Unit]) -> Result<(), CompileError> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for unit in units {
        let label = unit.label();
        if !is_shell_identifier(label) || [PROCEED, HEADER, FOOTER].contains(&label) {
            return Err(CompileError::InvalidUnitLabel {
                machine: machine.to_string(),
                label: label.to_string(),
            });
        }
        let precondition = unit.precondition();
        if precondition != PROCEED && !seen.contains(precondition) {
            return Err(CompileError::PreconditionNotRendered {
                machine: machine.to_string(),
                label: label.to_string(),
                precondition: precondition.to_string(),
            });
        }
        if !seen.insert(label) {
            return Err(CompileError::DuplicateUnit {
                machine: machine.to_string(),
                label: label.to_string(),
            });
        }
    }
    Ok(())
}

/// Build the script tree for one machine and mode.
pub fn render_script(machine: &str, units: &[Unit], mode: Mode) -> Result<ScriptNode, CompileError> {
    check_units(machine, units)?;

    let mut doc = ScriptNode::document().with_text("#!/bin/sh");
    doc.push(header(machine, mode));
    for unit in units {
        doc.push(unit_section(unit, mode));
    }
    doc.push(footer());
    Ok(doc)
}

fn header(machine: &str, mode: Mode) -> ScriptNode {
    let mut section = ScriptNode::section(HEADER)
        .with_attr("machine", machine)
        .with_attr("mode", mode.as_str());
    section
        .push(ScriptNode::comment(format!("{machine}: {mode} script")))
        .push_line("hostname=$(hostname)")
        .push_line("pass=0")
        .push_line("fail=0")
        .push_line("fail_string=\"\"")
        .push_line(format!("{PROCEED}=1"))
        .push_line(format!(
            "echo {}\"$hostname\"",
            shell_quote(&format!("{mode} {machine} on "))
        ));
    section
}

fn footer() -> ScriptNode {
    let mut section = ScriptNode::section(FOOTER);
    section
        .push_line("echo \"pass=$pass fail=$fail failed:$fail_string\"");
    section
}

/// Totals a script prints on its last line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub pass: u32,
    pub fail: u32,
    pub failed: Vec<String>,
}

impl RunSummary {
    /// Read the last `pass=<n> fail=<n> failed:<labels>` line of a run.
    pub fn parse(output: &str) -> Option<Self> {
        let line = output.lines().rev().find(|l| l.starts_with("pass="))?;
        let (counts, failed) = line.split_once(" failed:")?;
        let (pass, fail) = counts.split_once(' ')?;
        Some(Self {
            pass: pass.strip_prefix("pass=")?.parse().ok()?,
            fail: fail.strip_prefix("fail=")?.parse().ok()?,
            failed: failed.split_whitespace().map(str::to_string).collect(),
        })
    }
}

fn var(label: &str) -> String {
    if label == PROCEED {
        PROCEED.to_string()
    } else {
        format!("u_{label}")
    }
}

/// Capture audit output and set the unit's variable.
fn audit_lines(unit: &Unit) -> [ScriptNode; 2] {
    let v = var(unit.label());
    let op = match unit.polarity_kind() {
        Polarity::PassOnEqual => "=",
        Polarity::PassOnNotEqual => "!=",
    };
    [
        ScriptNode::line(format!("{OUTPUT_VAR}=$( {{ {}; }} 2>/dev/null )", unit.audit())),
        ScriptNode::line(format!(
            "if [ \"${OUTPUT_VAR}\" {op} {} ]; then {v}=1; else {v}=0; fi",
            shell_quote(unit.expected())
        )),
    ]
}

/// `if`/`else`/`fi` as two sibling blocks so `else` lines up with `if`.
fn if_else(condition: &str, then: Vec<ScriptNode>, otherwise: Vec<ScriptNode>) -> [ScriptNode; 2] {
    let mut first = ScriptNode::block(format!("if {condition}; then"), "");
    first.close = None;
    first.extend(then);
    let mut second = ScriptNode::block("else", "fi");
    second.extend(otherwise);
    [first, second]
}

fn tally(unit: &Unit) -> [ScriptNode; 2] {
    let label = unit.label();
    if_else(
        &format!("[ \"${}\" = 1 ]", var(label)),
        vec![
            ScriptNode::line("pass=$((pass + 1))"),
            ScriptNode::line(format!("echo {}", shell_quote(&format!("PASSED: {label}")))),
        ],
        vec![
            ScriptNode::line("fail=$((fail + 1))"),
            ScriptNode::line(format!("fail_string=\"$fail_string {label}\"")),
            ScriptNode::line(format!(
                "echo {}",
                shell_quote(&format!("FAILED: {label}: {}", unit.failure_message()))
            )),
        ],
    )
}

fn unit_section(unit: &Unit, mode: Mode) -> ScriptNode {
    let label = unit.label();
    let v = var(label);
    let mut section = ScriptNode::section(label).with_attr("after", unit.precondition());
    if unit.is_singleton() {
        section = section.with_attr("singleton", "yes");
    }

    match mode {
        Mode::Audit => {
            section.extend(audit_lines(unit));
        }
        Mode::Dryrun => {
            section.extend(audit_lines(unit));
            if let Some(config) = unit.config() {
                let mut pending = ScriptNode::block(format!("if [ \"${v}\" = 0 ]; then"), "fi");
                pending
                    .push_line(format!("echo {}", shell_quote(&format!("WOULD RUN: {label}"))))
                    .push_line(format!("printf '%s\\n' {}", shell_quote(config)));
                section.push(pending);
            }
        }
        Mode::Config => {
            let mut then: Vec<ScriptNode> = audit_lines(unit).into();
            if let Some(config) = unit.config() {
                let mut retry = ScriptNode::block(format!("if [ \"${v}\" = 0 ]; then"), "fi");
                retry
                    .push_line(format!("echo {}", shell_quote(&format!("CONFIGURING: {label}"))))
                    .push_line(config)
                    .extend(audit_lines(unit));
                then.push(retry);
            }
            let otherwise = vec![
                ScriptNode::line(format!("{v}=0")),
                ScriptNode::line(format!(
                    "echo {}",
                    shell_quote(&format!("SKIPPED: {label}: {} did not pass", unit.precondition()))
                )),
            ];
            let gate = var(unit.precondition());
            section.extend(if_else(&format!("[ \"${gate}\" = 1 ]"), then, otherwise));
        }
    }
    section.extend(tally(unit));
    section
}

#[cfg(test)]
mod tests {
    use super::{check_units, render_script, RunSummary};
    use crate::compiler::Mode;
    use crate::error::CompileError;
    use crate::unit::Unit;
    use pretty_assertions::assert_eq;

    fn units() -> Vec<Unit> {
        vec![
            Unit::singleton("a", "test -e /dev/vda && echo yes", "yes"),
            Unit::new("b", "cat /etc/b", "on", "echo on > /etc/b").after("a"),
        ]
    }

    #[test]
    fn config_script_layout() {
        let doc = render_script("websrv", &units(), Mode::Config).expect("render");
        let text = script_doc::render(&doc);
        let expected = r#"#!/bin/sh
# >>> header machine=websrv mode=config
# websrv: config script
hostname=$(hostname)
pass=0
fail=0
fail_string=""
proceed=1
echo 'config websrv on '"$hostname"
# <<< header
# >>> a after=proceed singleton=yes
if [ "$proceed" = 1 ]; then
    nc_out=$( { test -e /dev/vda && echo yes; } 2>/dev/null )
    if [ "$nc_out" = 'yes' ]; then u_a=1; else u_a=0; fi
else
    u_a=0
    echo 'SKIPPED: a: proceed did not pass'
fi
if [ "$u_a" = 1 ]; then
    pass=$((pass + 1))
    echo 'PASSED: a'
else
    fail=$((fail + 1))
    fail_string="$fail_string a"
    echo 'FAILED: a: a not satisfied'
fi
# <<< a
# >>> b after=a
if [ "$u_a" = 1 ]; then
    nc_out=$( { cat /etc/b; } 2>/dev/null )
    if [ "$nc_out" = 'on' ]; then u_b=1; else u_b=0; fi
    if [ "$u_b" = 0 ]; then
        echo 'CONFIGURING: b'
        echo on > /etc/b
        nc_out=$( { cat /etc/b; } 2>/dev/null )
        if [ "$nc_out" = 'on' ]; then u_b=1; else u_b=0; fi
    fi
else
    u_b=0
    echo 'SKIPPED: b: a did not pass'
fi
if [ "$u_b" = 1 ]; then
    pass=$((pass + 1))
    echo 'PASSED: b'
else
    fail=$((fail + 1))
    fail_string="$fail_string b"
    echo 'FAILED: b: b not satisfied'
fi
# <<< b
# >>> footer
echo "pass=$pass fail=$fail failed:$fail_string"
# <<< footer
"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn dryrun_prints_config_instead_of_running_it() {
        let doc = render_script("websrv", &units(), Mode::Dryrun).expect("render");
        let text = script_doc::render(&doc);
        assert!(text.contains("    echo 'WOULD RUN: b'\n    printf '%s\\n' 'echo on > /etc/b'\n"));
        assert!(!text.contains("CONFIGURING"));
    }

    #[test]
    fn audit_script_never_configures() {
        let text = script_doc::render(&render_script("websrv", &units(), Mode::Audit).expect("render"));
        assert!(!text.contains("echo on > /etc/b\n"));
    }

    #[test]
    fn duplicate_and_out_of_order_labels_are_rejected() {
        let dup = vec![Unit::singleton("a", "true", ""), Unit::singleton("a", "true", "")];
        assert!(matches!(
            check_units("web", &dup),
            Err(CompileError::DuplicateUnit { ref label, .. }) if label == "a"
        ));

        let early = vec![Unit::singleton("b", "true", "").after("a"), Unit::singleton("a", "true", "")];
        assert!(matches!(
            check_units("web", &early),
            Err(CompileError::PreconditionNotRendered { .. })
        ));

        let bad = vec![Unit::singleton("web-1", "true", "")];
        assert!(matches!(check_units("web", &bad), Err(CompileError::InvalidUnitLabel { .. })));
    }

    #[test]
    fn summary_is_read_from_the_last_line() {
        let output = "PASSED: a\nFAILED: b: b not satisfied\npass=1 fail=2 failed: b c\n";
        assert_eq!(
            RunSummary::parse(output),
            Some(RunSummary {
                pass: 1,
                fail: 2,
                failed: vec!["b".to_string(), "c".to_string()],
            })
        );
        let clean = RunSummary::parse("pass=3 fail=0 failed:").expect("summary");
        assert_eq!((clean.pass, clean.fail), (3, 0));
        assert!(clean.failed.is_empty());
        assert_eq!(RunSummary::parse("PASSED: a\n"), None);
    }

    #[test]
    fn self_precondition_is_rejected() {
        let units = vec![Unit::singleton("a", "true", "").after("a")];
        assert!(matches!(
            check_units("web", &units),
            Err(CompileError::PreconditionNotRendered { .. })
        ));
    }
}
