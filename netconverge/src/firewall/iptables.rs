//! `iptables-restore` documents.

use crate::error::CompileError;
use crate::firewall::{
    revision, Endpoint, FirewallBackend, FirewallDocument, FirewallPlan, LiveCheck, MachineRules,
    ResolvedRule,
};
use crate::model::{MachineId, NetworkGraph};

/// Longest chain name the kernel accepts.
pub const MAX_CHAIN_LEN: usize = 28;

const RULES_PATH: &str = "/etc/iptables/rules.v4";
const MARKER_CHAIN: &str = "netconverge";

pub struct Iptables;

impl FirewallBackend for Iptables {
    fn name(&self) -> &'static str {
        "iptables"
    }

    fn packages(&self) -> &'static [&'static str] {
        &["iptables", "iptables-persistent"]
    }

    fn service(&self) -> &'static str {
        "netfilter-persistent"
    }

    fn reload_command(&self) -> &'static str {
        "iptables-restore < /etc/iptables/rules.v4"
    }

    fn live_check(&self, revision: &str) -> LiveCheck {
        LiveCheck {
            command: format!("iptables -S {MARKER_CHAIN} 2>/dev/null | grep -c 'revision {revision}'"),
            expected: "1".to_string(),
        }
    }

    fn render_router(
        &self,
        graph: &NetworkGraph,
        plan: &FirewallPlan,
    ) -> Result<FirewallDocument, CompileError> {
        let router_label = graph.machine(plan.router).label.as_str();
        let members: Vec<&MachineRules> = plan
            .machines
            .iter()
            .filter(|m| m.id != plan.router && !m.is_empty() && !m.addresses.is_empty())
            .collect();
        for member in &members {
            for chain in member.chains.all() {
                if chain.len() > MAX_CHAIN_LEN {
                    return Err(CompileError::ChainNameTooLong {
                        machine: member.label.clone(),
                        chain: chain.to_string(),
                        max: MAX_CHAIN_LEN,
                    });
                }
            }
        }

        let mut out = vec![format!("# {router_label}: router ruleset")];

        out.push("*nat".to_string());
        for chain in ["PREROUTING", "INPUT", "OUTPUT", "POSTROUTING"] {
            out.push(format!(":{chain} ACCEPT [0:0]"));
        }
        for rule in &plan.dnat {
            let wan: Vec<Option<&str>> = if rule.from_wan && !plan.wan_ifaces.is_empty() {
                plan.wan_ifaces.iter().map(|w| Some(w.as_str())).collect()
            } else {
                vec![None]
            };
            for iface in wan {
                for dest in &rule.destinations {
                    let mut line = "-A PREROUTING".to_string();
                    if let Some(iface) = iface {
                        line.push_str(&format!(" -i {iface}"));
                    }
                    if *dest != Endpoint::Any {
                        line.push_str(&format!(" -d {dest}"));
                    }
                    line.push_str(&match_ports(rule.encapsulation.as_str(), &rule.ports));
                    line.push_str(&format!(" -j DNAT --to-destination {}", rule.to));
                    out.push(line);
                }
            }
        }
        for wan in &plan.wan_ifaces {
            out.push(format!("-A POSTROUTING -o {wan} -j MASQUERADE"));
        }
        out.push("COMMIT".to_string());

        out.push("*filter".to_string());
        out.extend(policy_lines());
        for member in &members {
            for chain in member.chains.all() {
                out.push(format!(":{chain} - [0:0]"));
            }
        }
        out.extend(input_baseline());
        for lan in &plan.lan_ifaces {
            out.push(format!("-A INPUT -i {lan} -p udp -m multiport --dports 53,67 -j ACCEPT"));
            out.push(format!("-A INPUT -i {lan} -p tcp -m multiport --dports 22,53 -j ACCEPT"));
        }
        if let Some(router) = plan.machine(plan.router) {
            for rule in router.listen.iter().chain(&router.ingress) {
                push_accepts(&mut out, "INPUT", rule, Side::Source);
            }
        }

        out.push("-A FORWARD -m conntrack --ctstate RELATED,ESTABLISHED -j ACCEPT".to_string());
        for member in &members {
            for addr in &member.addresses {
                out.push(format!("-A FORWARD -d {addr} -j {}", member.chains.ingress));
                out.push(format!("-A FORWARD -s {addr} -j {}", member.chains.forward));
                out.push(format!("-A FORWARD -s {addr} -j {}", member.chains.egress));
            }
        }

        for member in &members {
            for rule in member.listen.iter().chain(&member.ingress) {
                push_accepts(&mut out, &member.chains.ingress, rule, Side::Source);
            }
            for rule in &member.forward {
                push_accepts(&mut out, &member.chains.forward, rule, Side::Destination);
            }
            if member.throttled {
                out.push(format!(
                    "-A {} -m hashlimit --hashlimit-above 1mb/s --hashlimit-burst 2mb \
                     --hashlimit-mode srcip --hashlimit-name throttle -j DROP",
                    member.chains.egress
                ));
            }
            for rule in &member.egress {
                push_accepts(&mut out, &member.chains.egress, rule, Side::Destination);
            }
        }

        Ok(finish(out))
    }

    fn render_host(
        &self,
        graph: &NetworkGraph,
        plan: &FirewallPlan,
        id: MachineId,
    ) -> Result<FirewallDocument, CompileError> {
        let label = graph.machine(id).label.as_str();
        let mut out = vec![format!("# {label}: host ruleset"), "*filter".to_string()];
        out.extend(policy_lines());
        out.extend(input_baseline());
        out.push("-A INPUT -p tcp --dport 22 -j ACCEPT".to_string());
        if let Some(rules) = plan.machine(id) {
            for rule in rules.listen.iter().chain(&rules.ingress) {
                push_accepts(&mut out, "INPUT", rule, Side::Source);
            }
        }
        Ok(finish(out))
    }
}

/// Which end of a rule the chain does not already pin down.
#[derive(Clone, Copy)]
enum Side {
    Source,
    Destination,
}

fn push_accepts(out: &mut Vec<String>, chain: &str, rule: &ResolvedRule, side: Side) {
    let endpoints = match side {
        Side::Source => &rule.sources,
        Side::Destination => &rule.destinations,
    };
    let ports = match_ports(rule.encapsulation.as_str(), &rule.ports);
    for endpoint in endpoints {
        let address = match (endpoint, side) {
            (Endpoint::Any, _) => String::new(),
            (other, Side::Source) => format!(" -s {other}"),
            (other, Side::Destination) => format!(" -d {other}"),
        };
        out.push(format!("-A {chain}{address}{ports} -j ACCEPT"));
    }
}

fn match_ports(protocol: &str, ports: &crate::model::PortSet) -> String {
    let count = ports.iter().count();
    match count {
        0 => format!(" -p {protocol}"),
        1 => format!(" -p {protocol} --dport {}", ports.joined()),
        _ => format!(" -p {protocol} -m multiport --dports {}", ports.joined()),
    }
}

fn policy_lines() -> Vec<String> {
    vec![
        ":INPUT DROP [0:0]".to_string(),
        ":FORWARD DROP [0:0]".to_string(),
        ":OUTPUT ACCEPT [0:0]".to_string(),
        format!(":{MARKER_CHAIN} - [0:0]"),
    ]
}

fn input_baseline() -> Vec<String> {
    vec![
        "-A INPUT -i lo -j ACCEPT".to_string(),
        "-A INPUT -m conntrack --ctstate RELATED,ESTABLISHED -j ACCEPT".to_string(),
        "-A INPUT -p icmp -j ACCEPT".to_string(),
    ]
}

/// Close the filter table with the revision marker.
fn finish(mut lines: Vec<String>) -> FirewallDocument {
    let rev = revision(&lines.join("\n"));
    lines.push(format!(
        "-A {MARKER_CHAIN} -m comment --comment \"revision {rev}\" -j RETURN"
    ));
    lines.push("COMMIT".to_string());
    let mut content = lines.join("\n");
    content.push('\n');
    FirewallDocument {
        path: RULES_PATH.to_string(),
        content,
        revision: rev,
    }
}
