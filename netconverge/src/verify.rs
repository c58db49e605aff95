//! Reference checks over a network description.
//!
//! Unlike compilation, which stops at the first failure, verification walks
//! the whole description and reports every finding:
//! - `unknown_admin`: a server's `admins` names a user that is not declared
//! - `unknown_hypervisor`: a service names a hypervisor that is not a
//!   hypervisor server of the same network
//! - `missing_hypervisor`: a service does not name a hypervisor at all
//! - `unknown_target`: a firewall target is neither a label, an address,
//!   a network nor a hostname
//! - `router_count`: the network has no router, or more than one
//!
//! Warnings flag input that compiles but is probably not what was meant
//! (a hypervisor hosting nothing, a user with no devices). When the
//! reference checks pass, the network is also compiled so data and topology
//! errors surface as `compile_failed`.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::compiler::CompiledNetwork;
use crate::data::NetworkData;
use crate::model::{split_target, Ipv4Net, ANY};
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifySeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifyIssue {
    pub severity: VerifySeverity,
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub network: String,
    pub machines: usize,
    pub errors: usize,
    pub warnings: usize,
    pub issues: Vec<VerifyIssue>,
}

pub fn build_verify_report(name: &str, data: &NetworkData, settings: &Settings) -> VerifyReport {
    let labels = Labels::of(data);
    let mut issues = Vec::new();
    issues.extend(router_issues(data));
    issues.extend(admin_issues(data));
    issues.extend(hypervisor_issues(data));
    issues.extend(target_issues(data, &labels));
    issues.extend(user_issues(data));

    if !issues.iter().any(|i| i.severity == VerifySeverity::Error) {
        if let Err(e) = CompiledNetwork::build(name, data, settings.clone()) {
            issues.push(err("compile_failed", &e.to_string()));
        }
    }

    let errors = issues
        .iter()
        .filter(|i| i.severity == VerifySeverity::Error)
        .count();
    let warnings = issues.len() - errors;
    VerifyReport {
        network: name.to_string(),
        machines: labels.all.len(),
        errors,
        warnings,
        issues,
    }
}

pub fn render_verify_text(report: &VerifyReport) -> String {
    let mut out = Vec::new();
    out.push(format!(
        "verify network={} machines={}",
        report.network, report.machines
    ));
    out.push(format!(
        "result errors={} warnings={}",
        report.errors, report.warnings
    ));
    out.push("issues".to_string());
    if report.issues.is_empty() {
        out.push("- none".to_string());
        return out.join("\n");
    }
    for issue in &report.issues {
        let sev = match issue.severity {
            VerifySeverity::Error => "error",
            VerifySeverity::Warning => "warning",
        };
        out.push(format!("- [{sev}] {}: {}", issue.code, issue.message));
    }
    out.join("\n")
}

struct Labels<'a> {
    all: BTreeSet<&'a str>,
    hypervisors: BTreeSet<&'a str>,
}

impl<'a> Labels<'a> {
    fn of(data: &'a NetworkData) -> Self {
        let all = data
            .servers
            .keys()
            .chain(data.internaldevices.keys())
            .chain(data.externaldevices.keys())
            .chain(data.users.keys())
            .map(String::as_str)
            .collect();
        let hypervisors = data
            .servers
            .iter()
            .filter(|(_, s)| has_type(&s.types, "hypervisor"))
            .map(|(label, _)| label.as_str())
            .collect();
        Self { all, hypervisors }
    }
}

fn has_type(types: &[String], wanted: &str) -> bool {
    types.iter().any(|t| t.trim().eq_ignore_ascii_case(wanted))
}

fn router_issues(data: &NetworkData) -> Vec<VerifyIssue> {
    let routers: Vec<&str> = data
        .servers
        .iter()
        .filter(|(_, s)| has_type(&s.types, "router"))
        .map(|(label, _)| label.as_str())
        .collect();
    match routers.len() {
        1 => Vec::new(),
        0 => vec![err("router_count", "no server has type 'router'")],
        _ => vec![err(
            "router_count",
            &format!("more than one router: {}", routers.join(", ")),
        )],
    }
}

fn admin_issues(data: &NetworkData) -> Vec<VerifyIssue> {
    let mut out = Vec::new();
    for (label, server) in &data.servers {
        for admin in &server.admins {
            if !data.users.contains_key(admin) {
                out.push(err(
                    "unknown_admin",
                    &format!("{label}: admin '{admin}' is not a declared user"),
                ));
            }
        }
    }
    out
}

fn hypervisor_issues(data: &NetworkData) -> Vec<VerifyIssue> {
    let hypervisors = Labels::of(data).hypervisors;
    let mut hosting = BTreeSet::new();
    let mut out = Vec::new();
    for (label, server) in &data.servers {
        if !has_type(&server.types, "service") {
            continue;
        }
        match server.hypervisor.as_deref() {
            None => out.push(err(
                "missing_hypervisor",
                &format!("{label}: service does not name a hypervisor"),
            )),
            Some(hv) if hypervisors.contains(hv) => {
                hosting.insert(hv);
            }
            Some(hv) => out.push(err(
                "unknown_hypervisor",
                &format!("{label}: '{hv}' is not a hypervisor in this network"),
            )),
        }
    }
    for hv in hypervisors.difference(&hosting) {
        out.push(warn(
            "idle_hypervisor",
            &format!("{hv}: hypervisor hosts no services"),
        ));
    }
    out
}

fn target_issues(data: &NetworkData, labels: &Labels<'_>) -> Vec<VerifyIssue> {
    let mut out = Vec::new();
    let mut check = |label: &str, field: &str, raw: &str| match split_target(label, field, raw) {
        Err(e) => out.push(err("invalid_target", &e.to_string())),
        Ok((name, _)) if !known_target(labels, &name) => out.push(err(
            "unknown_target",
            &format!("{label}: {field} '{name}' is neither a machine label nor a host"),
        )),
        Ok(_) => {}
    };
    for (label, server) in &data.servers {
        let fw = &server.firewall;
        for (field, targets) in [
            ("allow_egress_to", &fw.allow_egress_to),
            ("allow_ingress_from", &fw.allow_ingress_from),
            ("allow_forward_to", &fw.allow_forward_to),
            ("dnat_to", &fw.dnat_to),
        ] {
            for raw in targets {
                check(label, field, raw);
            }
        }
    }
    for (label, device) in data.internaldevices.iter().chain(&data.externaldevices) {
        for raw in &device.allow_egress_to {
            check(label, "allow_egress_to", raw);
        }
    }
    out
}

/// Same precedence as rule resolution: labels, then literals, then any
/// dotted name as a hostname.
fn known_target(labels: &Labels<'_>, name: &str) -> bool {
    name == ANY
        || labels.all.contains(name)
        || name.parse::<Ipv4Addr>().is_ok()
        || name.parse::<Ipv4Net>().is_ok()
        || name.contains('.')
}

fn user_issues(data: &NetworkData) -> Vec<VerifyIssue> {
    data.users
        .iter()
        .filter(|(_, user)| user.macs.is_empty())
        .map(|(label, _)| {
            warn(
                "user_without_devices",
                &format!("{label}: user owns no devices and gets no address"),
            )
        })
        .collect()
}

fn err(code: &str, message: &str) -> VerifyIssue {
    VerifyIssue {
        severity: VerifySeverity::Error,
        code: code.to_string(),
        message: message.to_string(),
    }
}

fn warn(code: &str, message: &str) -> VerifyIssue {
    VerifyIssue {
        severity: VerifySeverity::Warning,
        code: code.to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_verify_report, render_verify_text, VerifySeverity};
    use crate::data::parse_networks;
    use crate::settings::Settings;
    use crate::testutil::LAB;
    use std::path::Path;

    fn report(raw: &str) -> super::VerifyReport {
        let networks = parse_networks(raw, Path::new(".")).expect("parse");
        let (name, data) = networks.iter().next().expect("one network");
        build_verify_report(name, data, &Settings::default())
    }

    fn codes(report: &super::VerifyReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn lab_network_is_clean() {
        let report = report(LAB);
        assert_eq!(report.errors, 0, "{:?}", report.issues);
        assert_eq!(report.warnings, 0);
        assert!(render_verify_text(&report).ends_with("issues\n- none"));
    }

    #[test]
    fn reports_every_broken_reference() {
        let report = report(
            r#"{"lab": {
                "servers": {
                    "router": {"types": ["router"], "admins": ["bob"]},
                    "websrv": {"types": ["service"], "hypervisor": "router",
                               "firewall": {"allow_egress_to": ["nosuchbox", "mirror.example.org:443"]}}
                },
                "users": {"alice": {}}
            }}"#,
        );
        assert_eq!(
            codes(&report),
            vec!["unknown_admin", "unknown_hypervisor", "unknown_target", "user_without_devices"]
        );
        assert_eq!(report.errors, 3);
        assert_eq!(report.warnings, 1);
        assert!(report.issues[2].message.contains("'nosuchbox'"));
    }

    #[test]
    fn counts_routers_and_idle_hypervisors() {
        let report = report(
            r#"{"lab": {"servers": {
                "hv": {"types": ["hypervisor"], "mac": "aa:bb:cc:00:00:10"}
            }}}"#,
        );
        assert_eq!(codes(&report), vec!["router_count", "idle_hypervisor"]);
        assert_eq!(report.issues[1].severity, VerifySeverity::Warning);
    }

    #[test]
    fn compile_errors_surface_after_clean_references() {
        let report = report(
            r#"{"lab": {"servers": {
                "router": {"types": ["router"]},
                "box": {"types": ["dedicated"]}
            }}}"#,
        );
        assert_eq!(codes(&report), vec!["compile_failed"]);
        assert!(report.issues[0].message.contains("box"));
    }
}
