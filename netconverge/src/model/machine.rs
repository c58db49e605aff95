use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::model::machine_type::PLACEMENT_PRIORITY;
use crate::model::{Encapsulation, MachineType, NetworkInterfaceModel, PortSet, TrafficRule};

/// How a server's own LAN interface is addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LanConnection {
    Static,
    Dhcp,
}

/// How the router's WAN interfaces are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WanConnection {
    Dhcp,
    Static,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiskMedium {
    Disk,
    Dvd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskSpec {
    pub name: String,
    pub medium: DiskMedium,
    pub format: String,
    pub filename: String,
    pub size_mb: u32,
}

/// Hosting details for a virtual service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceSpec {
    pub hypervisor: String,
    pub ram_mb: u32,
    pub cpus: u32,
    pub disks: Vec<DiskSpec>,
    pub backup_hours: Option<u32>,
    pub debian_mirror: String,
    pub debian_directory: String,
}

/// A person, who may also own devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAccount {
    pub fullname: String,
    pub sshkey: Option<String>,
}

/// One node of the network graph. Identity is the label; other machines
/// are only ever referenced by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineModel {
    pub label: String,
    pub types: BTreeSet<MachineType>,
    pub fqdn: String,
    pub cnames: Vec<String>,
    pub email: Option<String>,
    pub throttled: bool,
    pub lan: Vec<NetworkInterfaceModel>,
    pub wan: Vec<NetworkInterfaceModel>,
    /// Ports this machine serves, open to every internal machine.
    pub listen: Vec<TrafficRule>,
    pub ingress: Vec<TrafficRule>,
    pub egress: Vec<TrafficRule>,
    pub forward: Vec<TrafficRule>,
    /// Traffic for the listed destinations is rewritten to this machine.
    pub dnat: Vec<TrafficRule>,
    pub external_ip: Option<Ipv4Addr>,
    pub admins: Vec<String>,
    /// Extra profile names requested in the input.
    pub profiles: Vec<String>,
    pub connection: LanConnection,
    pub wan_connection: Option<WanConnection>,
    pub service: Option<ServiceSpec>,
    pub account: Option<UserAccount>,
}

impl MachineModel {
    pub fn is(&self, machine_type: MachineType) -> bool {
        self.types.contains(&machine_type)
    }

    pub fn is_router(&self) -> bool {
        self.is(MachineType::Router)
    }

    /// VLAN this machine is placed in. Routers are never placed.
    pub fn vlan_type(&self) -> Option<MachineType> {
        if self.is_router() {
            return None;
        }
        PLACEMENT_PRIORITY.into_iter().find(|t| self.is(*t))
    }

    /// Physical machines must declare their MACs, except a router that
    /// doubles as the hypervisor.
    pub fn requires_mac(&self) -> bool {
        if self.is_router() {
            return false;
        }
        self.types.iter().any(|t| t.requires_mac())
    }

    /// Ports opened by listen rules of one encapsulation.
    pub fn listen_ports(&self, encapsulation: Encapsulation) -> PortSet {
        let ports: Vec<i64> = self
            .listen
            .iter()
            .filter(|rule| rule.encapsulation == encapsulation)
            .flat_map(|rule| rule.ports.iter().map(i64::from))
            .collect();
        PortSet::new(&self.label, "listen", &ports).unwrap_or_default()
    }

    /// Every traffic rule this machine owns, in a fixed order.
    pub fn rules(&self) -> impl Iterator<Item = &TrafficRule> {
        self.listen
            .iter()
            .chain(&self.ingress)
            .chain(&self.egress)
            .chain(&self.forward)
            .chain(&self.dnat)
    }

    pub fn interfaces(&self) -> impl Iterator<Item = &NetworkInterfaceModel> {
        self.lan.iter().chain(&self.wan)
    }
}
