//! Firewall rule model.
//!
//! Traffic intent on each machine is resolved against the allocated
//! [`Topology`] into a [`FirewallPlan`]; backends turn the plan into files.

mod firewalld;
mod iptables;
mod resolve;

use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{CompileError, TopologyError};
use crate::model::{
    Encapsulation, Ipv4Net, MachineId, MachineModel, NetworkGraph, PortSet, Table, TrafficRule,
};
use crate::settings::FirewallBackendKind;
use crate::topology::Topology;

pub use firewalld::Firewalld;
pub use iptables::{Iptables, MAX_CHAIN_LEN};
pub use resolve::{classify, Target};

/// Encode a label so it only contains ASCII letters and digits.
///
/// Letters and digits other than `x` are kept; every other byte becomes `x`
/// followed by two lowercase hex digits. Distinct labels never collide.
pub fn slabel(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for byte in label.bytes() {
        if byte.is_ascii_alphanumeric() && byte != b'x' {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("x{byte:02x}"));
        }
    }
    out
}

/// Per-machine chain names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainNames {
    pub ingress: String,
    pub forward: String,
    pub egress: String,
}

impl ChainNames {
    pub fn for_label(label: &str) -> Self {
        let base = slabel(label);
        Self {
            ingress: format!("{base}_ingress"),
            forward: format!("{base}_fwd"),
            egress: format!("{base}_egress"),
        }
    }

    pub fn all(&self) -> [&str; 3] {
        [&self.ingress, &self.forward, &self.egress]
    }
}

/// A resolved rule endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Endpoint {
    Any,
    Net(Ipv4Net),
    /// DNS name handed to the backend unresolved.
    Host(String),
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Any => f.write_str("0.0.0.0/0"),
            Endpoint::Net(net) => write!(f, "{net}"),
            Endpoint::Host(host) => f.write_str(host),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedRule {
    pub encapsulation: Encapsulation,
    pub table: Table,
    pub sources: Vec<Endpoint>,
    pub destinations: Vec<Endpoint>,
    pub ports: PortSet,
}

/// Destination rewrite performed on the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DnatRule {
    pub owner: String,
    pub encapsulation: Encapsulation,
    pub destinations: Vec<Endpoint>,
    pub ports: PortSet,
    pub to: Ipv4Addr,
    /// Only match traffic arriving on a WAN interface.
    pub from_wan: bool,
}

/// Resolved rules of one machine.
#[derive(Debug, Clone, Serialize)]
pub struct MachineRules {
    pub id: MachineId,
    pub label: String,
    pub chains: ChainNames,
    pub addresses: Vec<Ipv4Addr>,
    pub throttled: bool,
    pub listen: Vec<ResolvedRule>,
    pub ingress: Vec<ResolvedRule>,
    pub forward: Vec<ResolvedRule>,
    pub egress: Vec<ResolvedRule>,
}

impl MachineRules {
    pub fn is_empty(&self) -> bool {
        self.listen.is_empty()
            && self.ingress.is_empty()
            && self.forward.is_empty()
            && self.egress.is_empty()
            && !self.throttled
    }
}

/// Every machine's resolved rules plus the router's DNAT table.
#[derive(Debug, Clone, Serialize)]
pub struct FirewallPlan {
    pub router: MachineId,
    pub machines: Vec<MachineRules>,
    pub dnat: Vec<DnatRule>,
    pub wan_ifaces: Vec<String>,
    pub lan_ifaces: Vec<String>,
}

impl FirewallPlan {
    pub fn build(graph: &NetworkGraph, topology: &Topology) -> Result<Self, TopologyError> {
        let resolver = resolve::Resolver { graph, topology };
        let mut machines = Vec::new();
        let mut dnat = Vec::new();

        for (id, machine) in graph.machines() {
            let rules = MachineRules {
                id,
                label: machine.label.clone(),
                chains: ChainNames::for_label(&machine.label),
                addresses: topology.addresses_of(id),
                throttled: machine.throttled,
                listen: resolve_all(&resolver, machine, &machine.listen, "firewall.listen")?,
                ingress: resolve_all(&resolver, machine, &machine.ingress, "firewall.allow_ingress_from")?,
                forward: resolve_all(&resolver, machine, &machine.forward, "firewall.allow_forward_to")?,
                egress: resolve_all(&resolver, machine, &machine.egress, "firewall.allow_egress_to")?,
            };

            if let Some(to) = rules.addresses.first().copied() {
                for rule in &machine.dnat {
                    let destinations =
                        resolver.endpoints(&machine.label, "firewall.dnat_to", &rule.destinations)?;
                    dnat.push(DnatRule {
                        owner: machine.label.clone(),
                        encapsulation: rule.encapsulation,
                        destinations,
                        ports: rule.ports.clone(),
                        to,
                        from_wan: false,
                    });
                }
                if let Some(external) = machine.external_ip {
                    dnat.push(DnatRule {
                        owner: machine.label.clone(),
                        encapsulation: Encapsulation::Tcp,
                        destinations: vec![Endpoint::Net(Ipv4Net::host(external))],
                        ports: machine.listen_ports(Encapsulation::Tcp),
                        to,
                        from_wan: true,
                    });
                }
            } else if !machine.dnat.is_empty() || machine.external_ip.is_some() {
                warn!(label = %machine.label, "machine has no LAN address, skipping DNAT");
            }

            debug!(label = %machine.label, chains = ?rules.chains.all(), "resolved firewall rules");
            machines.push(rules);
        }

        let router = graph.machine(topology.router);
        Ok(Self {
            router: topology.router,
            machines,
            dnat,
            wan_ifaces: router.wan.iter().map(|iface| iface.name.clone()).collect(),
            lan_ifaces: topology.vlans.iter().map(|iface| iface.name.clone()).collect(),
        })
    }

    pub fn machine(&self, id: MachineId) -> Option<&MachineRules> {
        self.machines.iter().find(|m| m.id == id)
    }
}

fn resolve_all(
    resolver: &resolve::Resolver<'_>,
    machine: &MachineModel,
    rules: &[TrafficRule],
    field: &str,
) -> Result<Vec<ResolvedRule>, TopologyError> {
    let mut out = Vec::new();
    for rule in rules {
        let sources = resolver.endpoints(&machine.label, field, [&rule.source])?;
        let destinations = resolver.endpoints(&machine.label, field, &rule.destinations)?;
        if sources.is_empty() || destinations.is_empty() {
            warn!(
                label = %machine.label,
                field,
                table = %rule.table,
                "rule endpoint has no address, skipping"
            );
            continue;
        }
        out.push(ResolvedRule {
            encapsulation: rule.encapsulation,
            table: rule.table,
            sources,
            destinations,
            ports: rule.ports.clone(),
        });
    }
    Ok(out)
}

/// Short stable fingerprint of a rendered ruleset, embedded in the rules so
/// the live ruleset can be compared with the file.
pub fn revision(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..8])
}

/// A rendered firewall file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallDocument {
    pub path: String,
    pub content: String,
    pub revision: String,
}

/// Shell command printing `expected` once the live rules carry a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveCheck {
    pub command: String,
    pub expected: String,
}

/// Turns a [`FirewallPlan`] into on-disk rules.
pub trait FirewallBackend {
    fn name(&self) -> &'static str;

    /// Packages that must be installed for the rules to load.
    fn packages(&self) -> &'static [&'static str];

    /// Systemd unit that loads the rules at boot.
    fn service(&self) -> &'static str;

    /// Command that loads the rendered rules into the running kernel.
    fn reload_command(&self) -> &'static str;

    fn live_check(&self, revision: &str) -> LiveCheck;

    /// Ruleset for the router: every machine's chains plus NAT.
    fn render_router(
        &self,
        graph: &NetworkGraph,
        plan: &FirewallPlan,
    ) -> Result<FirewallDocument, CompileError>;

    /// Host rules for one non-router machine.
    fn render_host(
        &self,
        graph: &NetworkGraph,
        plan: &FirewallPlan,
        id: MachineId,
    ) -> Result<FirewallDocument, CompileError>;
}

/// Backend selected in settings.
pub fn backend(kind: FirewallBackendKind) -> Box<dyn FirewallBackend> {
    match kind {
        FirewallBackendKind::Iptables => Box::new(Iptables),
        FirewallBackendKind::Firewalld => Box::new(Firewalld),
    }
}
