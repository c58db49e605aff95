//! Router trunk, VLANs and subnets for one network.
//!
//! `Topology::build` reads a finished [`NetworkGraph`] and returns the
//! allocation as a separate value. Nothing downstream can ask for an address
//! before this pass has run, because addresses only exist on `Topology`.

mod allocate;

use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, TopologyError};
use crate::model::{
    Direction, IfaceKind, InterfaceBuilder, Ipv4Net, MacAddress, MachineId, MachineType,
    NetworkGraph, NetworkInterfaceModel, Subnet,
};
use crate::settings::Settings;

pub use allocate::Assignment;

/// Source-based routing rule keeping a VLAN's subnet on its own table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoutingRule {
    pub iface: String,
    pub from: Ipv4Net,
    pub table: u16,
}

/// Host reservation handed out by the router's DHCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DhcpLease {
    pub label: String,
    pub iface: String,
    pub mac: MacAddress,
    pub address: Ipv4Addr,
    pub subnet: MachineType,
}

/// Everything the allocation pass decided.
#[derive(Debug, Clone, Serialize)]
pub struct Topology {
    pub router: MachineId,
    /// Carrier for every VLAN: a physical port, `bond0` or a dummy `lan0`.
    pub trunk: NetworkInterfaceModel,
    /// Physical ports enslaved to the trunk bond, if any.
    pub bond_members: Vec<NetworkInterfaceModel>,
    pub subnets: Vec<Subnet>,
    pub vlans: Vec<NetworkInterfaceModel>,
    pub routing_rules: Vec<RoutingRule>,
    placements: BTreeMap<MachineId, MachineType>,
    assignments: Vec<Assignment>,
}

impl Topology {
    pub fn build(graph: &NetworkGraph, settings: &Settings) -> Result<Self, Error> {
        let router = find_router(graph)?;
        let router_machine = graph.machine(router);
        let (trunk, bond_members) = build_trunk(router_machine.label.as_str(), &router_machine.lan)?;

        let placements = allocate::place(graph);
        let populated: BTreeSet<MachineType> = placements.values().copied().collect();

        let wan_nets: Vec<Ipv4Net> = graph
            .machines()
            .flat_map(|(_, m)| m.wan.iter().filter_map(|iface| iface.subnet))
            .collect();

        let mut subnets = Vec::new();
        let mut vlans = Vec::new();
        let mut routing_rules = Vec::new();
        for machine_type in vlan_types(graph.autoguest) {
            // Guests are anonymous; their VLAN exists whenever it is enabled.
            if !populated.contains(&machine_type) && machine_type != MachineType::Guest {
                debug!(%machine_type, "no members, skipping VLAN");
                continue;
            }
            let subnet = allocate_subnet(machine_type, settings, &subnets, &wan_nets)?;
            let vlan = InterfaceBuilder::new(subnet.iface.clone(), IfaceKind::Vlan, Direction::Lan)
                .vlan(trunk.name.clone(), subnet.vlan_id)
                .address(subnet.gateway)
                .subnet(Some(subnet.net))
                .build(&router_machine.label)?;
            routing_rules.push(RoutingRule {
                iface: subnet.iface.clone(),
                from: subnet.net,
                table: subnet.vlan_id,
            });
            debug!(%machine_type, net = %subnet.net, vlan = subnet.vlan_id, "allocated subnet");
            vlans.push(vlan);
            subnets.push(subnet);
        }

        let assignments = allocate::assign(graph, settings, &placements, &subnets)?;
        info!(
            network = %graph.name,
            subnets = subnets.len(),
            addresses = assignments.len(),
            "topology resolved"
        );

        Ok(Self {
            router,
            trunk,
            bond_members,
            subnets,
            vlans,
            routing_rules,
            placements,
            assignments,
        })
    }

    pub fn subnet(&self, machine_type: MachineType) -> Option<&Subnet> {
        self.subnets.iter().find(|s| s.machine_type == machine_type)
    }

    /// VLAN a machine was placed in. `None` for the router.
    pub fn placement(&self, id: MachineId) -> Option<MachineType> {
        self.placements.get(&id).copied()
    }

    pub fn subnet_of(&self, id: MachineId) -> Option<&Subnet> {
        self.placement(id).and_then(|t| self.subnet(t))
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// LAN addresses of a machine, in interface order. The router answers
    /// with its VLAN gateways.
    pub fn addresses_of(&self, id: MachineId) -> Vec<Ipv4Addr> {
        if id == self.router {
            return self.subnets.iter().map(|s| s.gateway).collect();
        }
        self.assignments
            .iter()
            .filter(|a| a.machine == id)
            .map(|a| a.address)
            .collect()
    }

    pub fn assignment(&self, id: MachineId, iface: &str) -> Option<&Assignment> {
        self.assignments
            .iter()
            .find(|a| a.machine == id && a.iface == iface)
    }

    /// DHCP reservations grouped in subnet order.
    pub fn leases(&self, graph: &NetworkGraph) -> Vec<DhcpLease> {
        let mut out = Vec::new();
        for subnet in &self.subnets {
            for assignment in &self.assignments {
                if assignment.subnet != subnet.machine_type {
                    continue;
                }
                let Some(mac) = assignment.mac else {
                    continue;
                };
                out.push(DhcpLease {
                    label: graph.machine(assignment.machine).label.clone(),
                    iface: assignment.iface.clone(),
                    mac,
                    address: assignment.address,
                    subnet: subnet.machine_type,
                });
            }
        }
        out
    }
}

fn vlan_types(autoguest: bool) -> impl Iterator<Item = MachineType> {
    crate::model::machine_type::VLAN_ELIGIBLE
        .into_iter()
        .filter(move |t| *t != MachineType::Guest || autoguest)
}

fn find_router(graph: &NetworkGraph) -> Result<MachineId, TopologyError> {
    let routers = graph.routers();
    match routers.as_slice() {
        [] => Err(TopologyError::NoRouter {
            network: graph.name.clone(),
        }),
        [(id, _)] => Ok(*id),
        many => Err(TopologyError::MultipleRouters {
            network: graph.name.clone(),
            labels: many
                .iter()
                .map(|(_, m)| m.label.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}

/// One port carries the VLANs directly, several are bonded, none gets a
/// dummy so the VLANs still have a parent.
fn build_trunk(
    label: &str,
    lan: &[NetworkInterfaceModel],
) -> Result<(NetworkInterfaceModel, Vec<NetworkInterfaceModel>), Error> {
    match lan {
        [] => {
            let dummy = InterfaceBuilder::new("lan0", IfaceKind::Dummy, Direction::Lan)
                .required_for_online(false)
                .build(label)?;
            Ok((dummy, Vec::new()))
        }
        [single] => Ok((single.clone(), Vec::new())),
        many => {
            let bond = InterfaceBuilder::new("bond0", IfaceKind::Bond, Direction::Lan)
                .members(many.iter().map(|iface| iface.name.clone()))
                .build(label)?;
            Ok((bond, many.to_vec()))
        }
    }
}

/// Start from the configured block and step forward until nothing overlaps.
fn allocate_subnet(
    machine_type: MachineType,
    settings: &Settings,
    taken: &[Subnet],
    wan_nets: &[Ipv4Net],
) -> Result<Subnet, TopologyError> {
    let prefix_len = settings.subnets.prefix_len;
    let no_room = || TopologyError::NoFreeSubnet {
        machine_type: machine_type.to_string(),
        prefix_len,
    };
    let plan = settings.vlan_for(machine_type).ok_or_else(no_room)?;
    let mut candidate = Ipv4Net::new(plan.base, prefix_len).ok_or_else(no_room)?;
    loop {
        let clashes = taken.iter().any(|s| s.net.overlaps(&candidate))
            || wan_nets.iter().any(|w| w.overlaps(&candidate));
        if !clashes {
            break;
        }
        candidate = candidate.next_block().ok_or_else(no_room)?;
    }
    Ok(Subnet {
        machine_type,
        net: candidate,
        vlan_id: plan.vlan,
        iface: machine_type.vlan_iface().to_string(),
        gateway: candidate.first_host(),
    })
}

#[cfg(test)]
mod tests {
    use super::Topology;
    use crate::data::parse_networks;
    use crate::error::{Error, TopologyError};
    use crate::model::{IfaceKind, MachineType, NetworkGraph};
    use crate::settings::{AllocationPolicy, Settings};
    use std::collections::BTreeSet;
    use std::net::Ipv4Addr;
    use std::path::Path;

    fn build(raw: &str, settings: &Settings) -> Result<(NetworkGraph, Topology), Error> {
        let networks = parse_networks(raw, Path::new(".")).expect("parse");
        let graph = NetworkGraph::build("lab", &networks["lab"], settings)?;
        let topology = Topology::build(&graph, settings)?;
        Ok((graph, topology))
    }

    const LAB: &str = r#"{"lab": {
        "servers": {
            "router": {"types": ["router"], "networkinterfaces": {"lan": {"eth0": {}}, "wan": {"eth1": {}}}},
            "hv": {"types": ["hypervisor"], "mac": "aa:bb:cc:00:00:10"},
            "websrv": {"types": ["service"], "hypervisor": "hv", "firewall": {"listen": {"tcp": [443]}}}
        },
        "users": {"alice": {"macs": ["aa:bb:cc:00:00:01"]}}
    }}"#;

    #[test]
    fn router_websrv_alice_scenario() {
        let (graph, topology) = build(LAB, &Settings::default()).expect("topology");

        let types: Vec<MachineType> = topology.subnets.iter().map(|s| s.machine_type).collect();
        assert_eq!(types, vec![MachineType::Server, MachineType::User]);

        let servers = topology.subnet(MachineType::Server).expect("servers");
        assert_eq!(servers.gateway, Ipv4Addr::new(10, 10, 0, 1));
        assert_eq!(servers.vlan_id, 10);
        assert_eq!(topology.trunk.name, "eth0");
        assert_eq!(topology.vlans[0].parent.as_deref(), Some("eth0"));
        assert_eq!(topology.routing_rules.len(), 2);

        let hv = graph.id("hv").expect("hv");
        let websrv = graph.id("websrv").expect("websrv");
        let alice = graph.id("alice").expect("alice");
        assert_eq!(topology.addresses_of(hv), vec![Ipv4Addr::new(10, 10, 0, 2)]);
        assert_eq!(topology.addresses_of(websrv), vec![Ipv4Addr::new(10, 10, 0, 3)]);
        assert_eq!(topology.addresses_of(alice), vec![Ipv4Addr::new(10, 40, 0, 2)]);
        assert_eq!(topology.placement(alice), Some(MachineType::User));

        let websrv_mac = topology.assignment(websrv, "lan0").and_then(|a| a.mac);
        assert!(websrv_mac.is_some_and(|mac| mac.octets()[..3] == [0x02, 0x4e, 0x43]));
        assert_eq!(topology.leases(&graph).len(), 3);
    }

    #[test]
    fn vlan_skipped_when_type_has_no_members() {
        let (_, topology) = build(LAB, &Settings::default()).expect("topology");
        assert!(topology.subnet(MachineType::InternalOnly).is_none());
        assert!(topology.subnet(MachineType::Guest).is_none());
        assert!(topology.vlans.iter().all(|v| v.name != "internalonly"));
    }

    #[test]
    fn guest_vlan_exists_whenever_enabled() {
        let raw = r#"{"lab": {"autoguest": true, "servers": {"router": {"types": ["router"]}}}}"#;
        let (_, topology) = build(raw, &Settings::default()).expect("topology");
        let guest = topology.subnet(MachineType::Guest).expect("guest subnet");
        assert_eq!(guest.iface, "guests");
        assert_eq!(guest.gateway, Ipv4Addr::new(10, 250, 0, 1));
    }

    #[test]
    fn addresses_are_unique_and_deterministic() {
        let raw = r#"{"lab": {
            "servers": {
                "router": {"types": ["router"]},
                "hv": {"types": ["hypervisor"], "networkinterfaces": {"lan": {
                    "eth0": {"mac": "aa:bb:cc:00:00:20", "address": "10.10.0.2"},
                    "eth1": {"mac": "aa:bb:cc:00:00:21"}
                }}},
                "a": {"types": ["service"], "hypervisor": "hv"},
                "b": {"types": ["service"], "hypervisor": "hv"}
            }
        }}"#;
        let (_, first) = build(raw, &Settings::default()).expect("topology");
        let (_, second) = build(raw, &Settings::default()).expect("topology");

        let addresses: Vec<Ipv4Addr> = first.assignments().iter().map(|a| a.address).collect();
        let unique: BTreeSet<Ipv4Addr> = addresses.iter().copied().collect();
        assert_eq!(unique.len(), addresses.len());
        assert!(addresses.contains(&Ipv4Addr::new(10, 10, 0, 2)));
        assert!(addresses.contains(&Ipv4Addr::new(10, 10, 0, 3)));
        assert_eq!(
            serde_json::to_string(&first).expect("json"),
            serde_json::to_string(&second).expect("json")
        );
        assert_eq!(first.trunk.kind, IfaceKind::Dummy);
    }

    #[test]
    fn machines_are_numbered_in_label_order() {
        let raw = r#"{"lab": {"servers": {
            "zeta": {"types": ["dedicated"], "mac": "aa:bb:cc:00:00:91"},
            "router": {"types": ["router"]},
            "alpha": {"types": ["dedicated"], "mac": "aa:bb:cc:00:00:92"}
        }}}"#;
        let (graph, topology) = build(raw, &Settings::default()).expect("topology");
        let alpha = graph.id("alpha").expect("alpha");
        let zeta = graph.id("zeta").expect("zeta");
        assert_eq!(topology.addresses_of(alpha), vec![Ipv4Addr::new(10, 10, 0, 2)]);
        assert_eq!(topology.addresses_of(zeta), vec![Ipv4Addr::new(10, 10, 0, 3)]);
    }

    #[test]
    fn several_router_ports_are_bonded() {
        let raw = r#"{"lab": {"servers": {
            "router": {"types": ["router"], "networkinterfaces": {"lan": {"eth0": {}, "eth1": {}}}},
            "web": {"types": ["dedicated"], "mac": "aa:bb:cc:00:00:30"}
        }}}"#;
        let (_, topology) = build(raw, &Settings::default()).expect("topology");
        assert_eq!(topology.trunk.name, "bond0");
        assert_eq!(topology.trunk.members, vec!["eth0".to_string(), "eth1".to_string()]);
        assert_eq!(topology.bond_members.len(), 2);
    }

    #[test]
    fn missing_mac_and_router_count_are_topology_errors() {
        let raw = r#"{"lab": {"servers": {"router": {"types": ["router"]}},
            "internaldevices": {"printer": {}}}}"#;
        assert!(matches!(
            build(raw, &Settings::default()),
            Err(Error::Topology(TopologyError::MissingMac { .. }))
        ));

        let raw = r#"{"lab": {"internaldevices": {"printer": {"macs": ["aa:bb:cc:00:00:40"]}}}}"#;
        assert!(matches!(
            build(raw, &Settings::default()),
            Err(Error::Topology(TopologyError::NoRouter { .. }))
        ));

        let raw = r#"{"lab": {"servers": {"r1": {"types": ["router"]}, "r2": {"types": ["router"]}}}}"#;
        assert!(matches!(
            build(raw, &Settings::default()),
            Err(Error::Topology(TopologyError::MultipleRouters { .. }))
        ));
    }

    #[test]
    fn subnet_exhaustion_names_the_machine() {
        let mut settings = Settings::default();
        settings.subnets.prefix_len = 30;
        let raw = r#"{"lab": {"servers": {"router": {"types": ["router"]}},
            "internaldevices": {
                "one": {"macs": ["aa:bb:cc:00:00:51"]},
                "two": {"macs": ["aa:bb:cc:00:00:52"]}
            }}}"#;
        let err = build(raw, &settings).expect_err("exhausted");
        assert!(matches!(err, Error::Topology(TopologyError::SubnetExhausted { ref label, .. }) if label == "two"));
    }

    #[test]
    fn per_subnet_policy_ignores_other_subnets() {
        let raw = r#"{"lab": {"servers": {
            "router": {"types": ["router"], "extconnection": "static", "networkinterfaces": {"wan": {
                "eth1": {"address": "10.40.0.2", "gateway": "10.40.0.254"}
            }}}
        },
        "users": {"alice": {"macs": ["aa:bb:cc:00:00:61"]}}}}"#;

        let (graph, wide) = build(raw, &Settings::default()).expect("topology");
        let alice = graph.id("alice").expect("alice");
        assert_eq!(wide.addresses_of(alice), vec![Ipv4Addr::new(10, 40, 0, 3)]);

        let mut settings = Settings::default();
        settings.allocation.policy = AllocationPolicy::PerSubnet;
        let (_, scoped) = build(raw, &settings).expect("topology");
        assert_eq!(scoped.addresses_of(alice), vec![Ipv4Addr::new(10, 40, 0, 2)]);
    }

    fn dedicated(address: &str) -> String {
        format!(
            r#"{{"lab": {{"servers": {{
                "router": {{"types": ["router"]}},
                "a": {{"types": ["dedicated"], "networkinterfaces": {{"lan": {{"eth0": {{"mac": "aa:bb:cc:00:00:81", "address": "10.10.0.5"}}}}}}}},
                "b": {{"types": ["dedicated"], "networkinterfaces": {{"lan": {{"eth0": {{"mac": "aa:bb:cc:00:00:82", "address": "{address}"}}}}}}}}
            }}}}}}"#
        )
    }

    #[test]
    fn explicit_addresses_must_be_free_hosts_of_their_subnet() {
        let (graph, topology) = build(&dedicated("10.10.0.6"), &Settings::default()).expect("topology");
        let b = graph.id("b").expect("b");
        assert_eq!(topology.addresses_of(b), vec![Ipv4Addr::new(10, 10, 0, 6)]);

        let err = build(&dedicated("10.10.0.5"), &Settings::default()).expect_err("shared address");
        assert!(matches!(
            err,
            Error::Topology(TopologyError::AddressInUse { ref label, ref owner, .. }) if label == "b" && owner == "a eth0"
        ));

        let err = build(&dedicated("10.10.0.1"), &Settings::default()).expect_err("gateway");
        assert!(matches!(
            err,
            Error::Topology(TopologyError::AddressInUse { ref owner, .. }) if owner == "servers gateway"
        ));

        for outside in ["192.168.77.9", "10.10.0.255", "10.10.0.0"] {
            let err = build(&dedicated(outside), &Settings::default()).expect_err("outside");
            assert!(matches!(
                err,
                Error::Topology(TopologyError::AddressOutsideSubnet { ref label, ref subnet, .. })
                    if label == "b" && subnet == "10.10.0.0/24"
            ));
        }

        let mut settings = Settings::default();
        settings.allocation.policy = AllocationPolicy::PerSubnet;
        assert!(build(&dedicated("10.10.0.5"), &settings).is_err());
    }

    #[test]
    fn subnet_steps_past_wan_network() {
        let raw = r#"{"lab": {"servers": {
            "router": {"types": ["router"], "extconnection": "static", "networkinterfaces": {"wan": {
                "eth1": {"address": "10.10.0.5", "subnet": "255.255.255.0", "gateway": "10.10.0.1"}
            }}},
            "web": {"types": ["dedicated"], "mac": "aa:bb:cc:00:00:70"}
        }}}"#;
        let (_, topology) = build(raw, &Settings::default()).expect("topology");
        let servers = topology.subnet(MachineType::Server).expect("servers");
        assert_eq!(servers.net.to_string(), "10.10.1.0/24");
    }
}
