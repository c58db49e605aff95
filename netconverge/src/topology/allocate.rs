use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::debug;

use crate::error::TopologyError;
use crate::model::mac::parse_prefix;
use crate::model::{MacAddress, MachineId, MachineModel, MachineType, NetworkGraph, Subnet};
use crate::settings::{AllocationPolicy, Settings};

/// Address (and MAC) settled for one LAN interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub machine: MachineId,
    pub iface: String,
    pub address: Ipv4Addr,
    pub mac: Option<MacAddress>,
    pub subnet: MachineType,
    /// Address came from the input rather than the allocator.
    pub explicit: bool,
    pub generated_mac: bool,
}

/// Pick a VLAN for every non-router machine that has a LAN interface.
pub(super) fn place(graph: &NetworkGraph) -> BTreeMap<MachineId, MachineType> {
    graph
        .machines()
        .filter(|(_, m)| !m.lan.is_empty())
        .filter_map(|(id, m)| m.vlan_type().map(|t| (id, t)))
        .collect()
}

pub(super) fn assign(
    graph: &NetworkGraph,
    settings: &Settings,
    placements: &BTreeMap<MachineId, MachineType>,
    subnets: &[Subnet],
) -> Result<Vec<Assignment>, TopologyError> {
    check_macs(graph, placements)?;

    let prefix = parse_prefix(&settings.mac.prefix).unwrap_or([0x02, 0x4e, 0x43]);
    let mut used_macs: BTreeSet<MacAddress> = graph
        .machines()
        .flat_map(|(_, m)| m.interfaces().filter_map(|iface| iface.mac))
        .collect();
    let mut used = UsedAddresses::new(graph, settings.allocation.policy, subnets);
    claim_explicit(graph, placements, subnets, &mut used)?;

    let mut out = Vec::new();
    for subnet in subnets {
        for (id, machine) in members(graph, placements, subnet) {
            for iface in &machine.lan {
                let (mac, generated_mac) = match iface.mac {
                    Some(mac) => (Some(mac), false),
                    None => {
                        let mac = fresh_mac(prefix, &machine.label, &used_macs);
                        used_macs.insert(mac);
                        debug!(label = %machine.label, iface = %iface.name, %mac, "generated MAC");
                        (Some(mac), true)
                    }
                };

                let (address, explicit) = match iface.addresses.first() {
                    Some(address) => (*address, true),
                    None => {
                        let address = subnet
                            .net
                            .hosts_after(subnet.gateway)
                            .find(|candidate| used.owner(subnet.machine_type, *candidate).is_none())
                            .ok_or_else(|| TopologyError::SubnetExhausted {
                                label: machine.label.clone(),
                                subnet: subnet.net.to_string(),
                            })?;
                        used.insert(subnet.machine_type, address, owner(&machine.label, &iface.name));
                        (address, false)
                    }
                };
                debug!(label = %machine.label, iface = %iface.name, %address, explicit, "assigned address");

                out.push(Assignment {
                    machine: id,
                    iface: iface.name.clone(),
                    address,
                    mac,
                    subnet: subnet.machine_type,
                    explicit,
                    generated_mac,
                });
            }
        }
    }
    Ok(out)
}

fn members<'a>(
    graph: &'a NetworkGraph,
    placements: &'a BTreeMap<MachineId, MachineType>,
    subnet: &'a Subnet,
) -> impl Iterator<Item = (MachineId, &'a MachineModel)> {
    graph
        .machines()
        .filter(move |(id, _)| placements.get(id) == Some(&subnet.machine_type))
}

/// Reserve every address written in the input before the allocator runs.
/// An explicit address must be a host of the subnet its machine is placed
/// in and must not repeat a gateway or another explicit address.
fn claim_explicit(
    graph: &NetworkGraph,
    placements: &BTreeMap<MachineId, MachineType>,
    subnets: &[Subnet],
    used: &mut UsedAddresses,
) -> Result<(), TopologyError> {
    for subnet in subnets {
        for (_, machine) in members(graph, placements, subnet) {
            for iface in &machine.lan {
                let Some(address) = iface.addresses.first().copied() else {
                    continue;
                };
                let field = format!("networkinterfaces.lan.{}.address", iface.name);
                let net = subnet.net;
                if !net.contains(address) || address == net.network() || address == net.broadcast() {
                    return Err(TopologyError::AddressOutsideSubnet {
                        label: machine.label.clone(),
                        field,
                        address: address.to_string(),
                        subnet: net.to_string(),
                    });
                }
                if let Some(taken) = used.owner(subnet.machine_type, address) {
                    return Err(TopologyError::AddressInUse {
                        label: machine.label.clone(),
                        field,
                        address: address.to_string(),
                        owner: taken.to_string(),
                    });
                }
                used.insert(subnet.machine_type, address, owner(&machine.label, &iface.name));
            }
        }
    }
    Ok(())
}

fn owner(label: &str, iface: &str) -> String {
    format!("{label} {iface}")
}

fn check_macs(
    graph: &NetworkGraph,
    placements: &BTreeMap<MachineId, MachineType>,
) -> Result<(), TopologyError> {
    for id in placements.keys() {
        let machine = graph.machine(*id);
        if !machine.requires_mac() {
            continue;
        }
        if let Some(iface) = machine.lan.iter().find(|iface| iface.mac.is_none()) {
            return Err(TopologyError::MissingMac {
                label: machine.label.clone(),
                iface: iface.name.clone(),
            });
        }
    }
    Ok(())
}

fn fresh_mac(prefix: [u8; 3], label: &str, used: &BTreeSet<MacAddress>) -> MacAddress {
    (0u32..)
        .map(|attempt| MacAddress::derived(prefix, label, attempt))
        .find(|mac| !used.contains(mac))
        .unwrap_or_else(|| MacAddress::derived(prefix, label, 0))
}

/// Taken addresses and who holds them, scoped by the allocation policy.
///
/// Gateways are always taken. The network-wide scope also holds every WAN
/// address declared in the network.
enum UsedAddresses {
    NetworkWide(BTreeMap<Ipv4Addr, String>),
    PerSubnet(BTreeMap<MachineType, BTreeMap<Ipv4Addr, String>>),
}

impl UsedAddresses {
    fn new(graph: &NetworkGraph, policy: AllocationPolicy, subnets: &[Subnet]) -> Self {
        let gateways = subnets
            .iter()
            .map(|s| (s.machine_type, s.gateway, format!("{} gateway", s.iface)));
        match policy {
            AllocationPolicy::NetworkWide => {
                let mut used: BTreeMap<Ipv4Addr, String> = graph
                    .machines()
                    .flat_map(|(_, m)| {
                        m.wan.iter().flat_map(move |iface| {
                            iface
                                .addresses
                                .iter()
                                .map(move |address| (*address, owner(&m.label, &iface.name)))
                        })
                    })
                    .collect();
                used.extend(gateways.map(|(_, address, who)| (address, who)));
                Self::NetworkWide(used)
            }
            AllocationPolicy::PerSubnet => {
                let mut used: BTreeMap<MachineType, BTreeMap<Ipv4Addr, String>> = BTreeMap::new();
                for (machine_type, address, who) in gateways {
                    used.entry(machine_type).or_default().insert(address, who);
                }
                Self::PerSubnet(used)
            }
        }
    }

    fn owner(&self, subnet: MachineType, address: Ipv4Addr) -> Option<&str> {
        match self {
            Self::NetworkWide(used) => used.get(&address),
            Self::PerSubnet(used) => used.get(&subnet).and_then(|set| set.get(&address)),
        }
        .map(String::as_str)
    }

    fn insert(&mut self, subnet: MachineType, address: Ipv4Addr, who: String) {
        match self {
            Self::NetworkWide(used) => {
                used.insert(address, who);
            }
            Self::PerSubnet(used) => {
                used.entry(subnet).or_default().insert(address, who);
            }
        }
    }
}
