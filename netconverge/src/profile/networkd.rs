//! systemd-networkd files.
//!
//! The router gets its trunk, optional bond, one VLAN per subnet with a
//! source routing rule, and its WAN ports. Every other host gets one
//! `.network` file per LAN interface, matched by MAC where one is known.

use std::net::Ipv4Addr;

use script_doc::shell_quote;

use crate::error::Error;
use crate::model::{IfaceKind, Ipv4Net, NetworkInterfaceModel};
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{file_content, key, service_enabled, service_running};
use crate::unit::Unit;

const NETWORK_DIR: &str = "/etc/systemd/network";
const SERVICE: &str = "systemd-networkd";

pub struct Networkd;

fn build() -> Box<dyn Profile> {
    Box::new(Networkd)
}

inventory::submit! {
    ProfileRegistration { name: "networkd", build }
}

/// One file under [`NETWORK_DIR`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct NetFile {
    name: String,
    body: String,
}

impl NetFile {
    fn new(iface: &NetworkInterfaceModel, extension: &str, sections: Vec<Section>) -> Self {
        let body = sections
            .iter()
            .map(Section::render)
            .collect::<Vec<_>>()
            .join("\n");
        Self {
            name: format!("{:02}-{}.{extension}", iface.weight, iface.name),
            body,
        }
    }

    fn path(&self) -> String {
        format!("{NETWORK_DIR}/{}", self.name)
    }
}

struct Section {
    name: &'static str,
    keys: Vec<(&'static str, String)>,
}

impl Section {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            keys: Vec::new(),
        }
    }

    fn set(mut self, key: &'static str, value: impl ToString) -> Self {
        self.keys.push((key, value.to_string()));
        self
    }

    fn render(&self) -> String {
        let mut out = format!("[{}]\n", self.name);
        for (key, value) in &self.keys {
            out.push_str(&format!("{key}={value}\n"));
        }
        out
    }
}

fn netdev(iface: &NetworkInterfaceModel) -> Option<NetFile> {
    let base = Section::new("NetDev")
        .set("Name", &iface.name)
        .set("Kind", iface.kind);
    let sections = match iface.kind {
        IfaceKind::Bond => vec![
            base,
            Section::new("Bond")
                .set("Mode", "802.3ad")
                .set("TransmitHashPolicy", "layer3+4"),
        ],
        IfaceKind::Vlan => vec![base, Section::new("VLAN").set("Id", iface.vlan_id?)],
        IfaceKind::Dummy => vec![base],
        _ => return None,
    };
    Some(NetFile::new(iface, "netdev", sections))
}

fn match_section(iface: &NetworkInterfaceModel) -> Section {
    match (iface.kind.is_virtual(), iface.mac) {
        (false, Some(mac)) => Section::new("Match").set("MACAddress", mac),
        _ => Section::new("Match").set("Name", &iface.name),
    }
}

fn link_section(iface: &NetworkInterfaceModel) -> Option<Section> {
    if iface.required_for_online && iface.arp {
        return None;
    }
    let mut link = Section::new("Link");
    if !iface.required_for_online {
        link = link.set("RequiredForOnline", "no");
    }
    if !iface.arp {
        link = link.set("ARP", "no");
    }
    Some(link)
}

fn addressed(network: Section, addresses: &[Ipv4Addr], subnet: Option<Ipv4Net>) -> Section {
    let prefix = subnet.map_or(32, |s| s.prefix_len());
    addresses
        .iter()
        .fold(network, |section, addr| section.set("Address", format!("{addr}/{prefix}")))
}

fn router_files(ctx: &ProfileContext<'_>) -> Vec<NetFile> {
    let topology = &ctx.net.topology;
    let mut files = Vec::new();

    for member in &topology.bond_members {
        let network = Section::new("Network").set("Bond", &topology.trunk.name);
        files.push(NetFile::new(member, "network", vec![match_section(member), network]));
    }

    let trunk = &topology.trunk;
    files.extend(netdev(trunk));
    let mut sections = vec![match_section(trunk)];
    sections.extend(link_section(trunk));
    let network = topology
        .vlans
        .iter()
        .fold(Section::new("Network").set("LinkLocalAddressing", "no"), |s, vlan| {
            s.set("VLAN", &vlan.name)
        });
    sections.push(network);
    files.push(NetFile::new(trunk, "network", sections));

    for vlan in &topology.vlans {
        files.extend(netdev(vlan));
        let mut sections = vec![match_section(vlan)];
        sections.push(addressed(
            Section::new("Network").set("ConfigureWithoutCarrier", "yes"),
            &vlan.addresses,
            vlan.subnet,
        ));
        for rule in topology.routing_rules.iter().filter(|r| r.iface == vlan.name) {
            sections.push(
                Section::new("Route")
                    .set("Destination", rule.from)
                    .set("Table", rule.table),
            );
            sections.push(
                Section::new("RoutingPolicyRule")
                    .set("From", rule.from)
                    .set("Table", rule.table),
            );
        }
        files.push(NetFile::new(vlan, "network", sections));
    }

    for wan in &ctx.machine().wan {
        let mut network = match wan.kind {
            IfaceKind::Dhcp => Section::new("Network").set("DHCP", "ipv4"),
            _ => {
                let section = addressed(Section::new("Network"), &wan.addresses, wan.subnet);
                match wan.gateway {
                    Some(gateway) => section.set("Gateway", gateway),
                    None => section,
                }
            }
        };
        if wan.ip_forwarding {
            network = network.set("IPForward", "yes");
        }
        if wan.ip_masquerading {
            network = network.set("IPMasquerade", "ipv4");
        }
        let mut sections = vec![match_section(wan)];
        sections.extend(link_section(wan));
        sections.push(network);
        files.push(NetFile::new(wan, "network", sections));
    }
    files
}

fn host_files(ctx: &ProfileContext<'_>) -> Vec<NetFile> {
    let topology = &ctx.net.topology;
    let gateway = topology.subnet_of(ctx.id).map(|s| (s.gateway, s.net));
    let mut files = Vec::new();
    for iface in &ctx.machine().lan {
        let assignment = topology.assignment(ctx.id, &iface.name);
        let mut matched = iface.clone();
        if matched.mac.is_none() {
            matched.mac = assignment.and_then(|a| a.mac);
        }
        let network = match (iface.kind, assignment, gateway) {
            (IfaceKind::Static, Some(assignment), Some((gateway, net))) => {
                addressed(Section::new("Network"), &[assignment.address], Some(net))
                    .set("Gateway", gateway)
                    .set("DNS", gateway)
                    .set("Domains", &ctx.net.graph.domain)
            }
            _ => Section::new("Network").set("DHCP", "ipv4"),
        };
        let mut sections = vec![match_section(&matched)];
        sections.extend(link_section(iface));
        sections.push(network);
        files.push(NetFile::new(iface, "network", sections));
    }
    files
}

fn files(ctx: &ProfileContext<'_>) -> Vec<NetFile> {
    if ctx.machine().is_router() {
        router_files(ctx)
    } else {
        host_files(ctx)
    }
}

/// Statically addressed interfaces and the address they should carry.
fn live_addresses(ctx: &ProfileContext<'_>) -> Vec<(String, String)> {
    if ctx.machine().is_router() {
        return ctx
            .net
            .topology
            .vlans
            .iter()
            .filter_map(|vlan| {
                let addr = vlan.addresses.first()?;
                let prefix = vlan.subnet?.prefix_len();
                Some((vlan.name.clone(), format!("{addr}/{prefix}")))
            })
            .collect();
    }
    let Some(subnet) = ctx.net.topology.subnet_of(ctx.id) else {
        return Vec::new();
    };
    ctx.machine()
        .lan
        .iter()
        .filter(|iface| iface.kind == IfaceKind::Static)
        .filter_map(|iface| {
            let assignment = ctx.net.topology.assignment(ctx.id, &iface.name)?;
            Some((
                iface.name.clone(),
                format!("{}/{}", assignment.address, subnet.net.prefix_len()),
            ))
        })
        .collect()
}

impl Profile for Networkd {
    fn name(&self) -> &'static str {
        "networkd"
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(files(ctx)
            .iter()
            .map(|file| file_content(&file.path(), &file.body))
            .collect())
    }

    fn live_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let enabled = service_enabled(SERVICE);
        let running = service_running(SERVICE).after(enabled.label());
        let running_label = running.label().to_string();
        let mut units = vec![enabled, running];
        for (iface, cidr) in live_addresses(ctx) {
            let q = shell_quote(&iface);
            units.push(
                Unit::new(
                    format!("addr_{}", key(&iface)),
                    format!("ip -4 -o addr show dev {q} | awk '{{print $4}}' | head -n 1"),
                    cidr.as_str(),
                    format!("networkctl reload && networkctl reconfigure {q}"),
                )
                .after(&running_label)
                .message(format!("{iface} does not carry {cidr}")),
            );
        }
        Ok(units)
    }
}
