use std::fmt::Write as _;

use colored::Colorize;
use script_doc::{format_summary, format_text, DiffEntry};

use crate::compiler::{CompiledNetwork, MachineScript};
use crate::profile::profile_names;

/// Render script diff entries for terminal output.
pub fn render_diff_text(entries: &[DiffEntry]) -> String {
    let raw = format_text(entries);
    let mut out = Vec::new();

    for line in raw.lines() {
        let colored = match line.trim_start().chars().next() {
            Some('+') => line.green().to_string(),
            Some('-') => line.red().to_string(),
            Some('~') => line.yellow().to_string(),
            Some('!') => line.magenta().to_string(),
            Some('=') => line.dimmed().to_string(),
            _ => line.to_string(),
        };
        out.push(colored);
    }

    out.join("\n")
}

pub fn render_diff_summary(entries: &[DiffEntry]) -> String {
    format_summary(entries).cyan().to_string()
}

/// Subnets, router interfaces and per-machine addresses.
pub fn render_topology(name: &str, net: &CompiledNetwork) -> String {
    let graph = &net.graph;
    let topology = &net.topology;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} domain={} machines={} router={}",
        format!("network {name}").bold(),
        graph.domain,
        graph.len(),
        graph.machine(topology.router).label
    );

    let _ = writeln!(out, "{}", "trunk".cyan().bold());
    let members: Vec<&str> = topology
        .bond_members
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    if members.is_empty() {
        let _ = writeln!(out, "- {} ({})", topology.trunk.name, topology.trunk.kind);
    } else {
        let _ = writeln!(
            out,
            "- {} ({}) members={}",
            topology.trunk.name,
            topology.trunk.kind,
            members.join(",")
        );
    }

    let _ = writeln!(out, "{}", "subnets".cyan().bold());
    for subnet in &topology.subnets {
        let _ = writeln!(
            out,
            "- {} vlan={} iface={} net={} gateway={}",
            subnet.machine_type, subnet.vlan_id, subnet.iface, subnet.net, subnet.gateway
        );
    }

    let _ = writeln!(out, "{}", "machines".cyan().bold());
    for (id, machine) in graph.machines() {
        let types: Vec<String> = machine.types.iter().map(|t| t.to_string()).collect();
        let placed = topology
            .placement(id)
            .map_or_else(|| "-".to_string(), |t| t.to_string());
        let addresses: Vec<String> = topology
            .addresses_of(id)
            .iter()
            .map(|a| a.to_string())
            .collect();
        let _ = write!(
            out,
            "- {} [{}] vlan={} addr={}",
            machine.label,
            types.join(","),
            placed,
            if addresses.is_empty() {
                "-".to_string()
            } else {
                addresses.join(",")
            }
        );
        if crate::profile::is_managed(machine) {
            let _ = write!(out, " profiles={}", profile_names(machine).join(","));
        }
        out.push('\n');
    }
    out
}

/// One line per written script.
pub fn render_compile_summary(scripts: &[MachineScript]) -> String {
    let mut out = Vec::new();
    for script in scripts {
        out.push(format!(
            "{} {} units={}",
            "wrote".green(),
            script.file_name(),
            script.units
        ));
    }
    out.push(format!("scripts={}", scripts.len()).cyan().to_string());
    out.join("\n")
}
