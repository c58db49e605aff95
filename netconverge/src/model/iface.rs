use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::error::DataError;
use crate::model::{Ipv4Net, MacAddress};

/// How an interface gets configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IfaceKind {
    /// Link up, no addressing (carrier for VLANs or a bond member).
    Manual,
    Static,
    Dhcp,
    Bond,
    Vlan,
    Dummy,
    Tunnel,
}

impl IfaceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IfaceKind::Manual => "manual",
            IfaceKind::Static => "static",
            IfaceKind::Dhcp => "dhcp",
            IfaceKind::Bond => "bond",
            IfaceKind::Vlan => "vlan",
            IfaceKind::Dummy => "dummy",
            IfaceKind::Tunnel => "tunnel",
        }
    }

    /// Default ordering weight for on-disk config files. Lower sorts first,
    /// so carriers are configured before what stacks on them.
    pub fn default_weight(self) -> u8 {
        match self {
            IfaceKind::Manual | IfaceKind::Static | IfaceKind::Dhcp | IfaceKind::Dummy => 10,
            IfaceKind::Bond => 20,
            IfaceKind::Vlan => 30,
            IfaceKind::Tunnel => 40,
        }
    }

    /// Kinds that need a `.netdev` file to exist at all.
    pub fn is_virtual(self) -> bool {
        matches!(
            self,
            IfaceKind::Bond | IfaceKind::Vlan | IfaceKind::Dummy | IfaceKind::Tunnel
        )
    }
}

impl Display for IfaceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Lan,
    Wan,
}

/// A typed network attachment owned by one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkInterfaceModel {
    pub name: String,
    pub kind: IfaceKind,
    pub direction: Direction,
    pub mac: Option<MacAddress>,
    pub addresses: Vec<Ipv4Addr>,
    pub subnet: Option<Ipv4Net>,
    pub gateway: Option<Ipv4Addr>,
    pub broadcast: Option<Ipv4Addr>,
    pub weight: u8,
    pub arp: bool,
    pub ip_forwarding: bool,
    pub ip_masquerading: bool,
    pub required_for_online: bool,
    /// Carrier interface, VLANs only.
    pub parent: Option<String>,
    pub vlan_id: Option<u16>,
    /// Enslaved interfaces, bonds only.
    pub members: Vec<String>,
}

/// Collects interface fields, then checks they are legal for the kind.
#[derive(Debug, Clone)]
pub struct InterfaceBuilder {
    iface: NetworkInterfaceModel,
}

impl InterfaceBuilder {
    pub fn new(name: impl Into<String>, kind: IfaceKind, direction: Direction) -> Self {
        Self {
            iface: NetworkInterfaceModel {
                name: name.into(),
                kind,
                direction,
                mac: None,
                addresses: Vec::new(),
                subnet: None,
                gateway: None,
                broadcast: None,
                weight: kind.default_weight(),
                arp: true,
                ip_forwarding: false,
                ip_masquerading: false,
                required_for_online: !matches!(kind, IfaceKind::Dummy),
                parent: None,
                vlan_id: None,
                members: Vec::new(),
            },
        }
    }

    pub fn mac(mut self, mac: Option<MacAddress>) -> Self {
        self.iface.mac = mac;
        self
    }

    pub fn address(mut self, addr: Ipv4Addr) -> Self {
        self.iface.addresses.push(addr);
        self
    }

    pub fn subnet(mut self, subnet: Option<Ipv4Net>) -> Self {
        self.iface.subnet = subnet;
        self
    }

    pub fn gateway(mut self, gateway: Option<Ipv4Addr>) -> Self {
        self.iface.gateway = gateway;
        self
    }

    pub fn broadcast(mut self, broadcast: Option<Ipv4Addr>) -> Self {
        self.iface.broadcast = broadcast;
        self
    }

    pub fn weight(mut self, weight: u8) -> Self {
        self.iface.weight = weight;
        self
    }

    pub fn arp(mut self, arp: bool) -> Self {
        self.iface.arp = arp;
        self
    }

    pub fn ip_forwarding(mut self, on: bool) -> Self {
        self.iface.ip_forwarding = on;
        self
    }

    pub fn ip_masquerading(mut self, on: bool) -> Self {
        self.iface.ip_masquerading = on;
        self
    }

    pub fn required_for_online(mut self, on: bool) -> Self {
        self.iface.required_for_online = on;
        self
    }

    pub fn vlan(mut self, parent: impl Into<String>, vlan_id: u16) -> Self {
        self.iface.parent = Some(parent.into());
        self.iface.vlan_id = Some(vlan_id);
        self
    }

    pub fn members<I: IntoIterator<Item = String>>(mut self, members: I) -> Self {
        self.iface.members = members.into_iter().collect();
        self
    }

    /// Validate against the kind's rules. `label` names the owning machine
    /// in errors.
    pub fn build(self, label: &str) -> Result<NetworkInterfaceModel, DataError> {
        let iface = self.iface;
        let invalid = |reason: &str| DataError::InvalidInterface {
            label: label.to_string(),
            iface: iface.name.clone(),
            reason: reason.to_string(),
        };

        if !is_valid_iface_name(&iface.name) {
            return Err(invalid("name must be 1-15 characters without '/', ':' or whitespace"));
        }
        match iface.kind {
            IfaceKind::Dhcp => {
                if !iface.addresses.is_empty()
                    || iface.subnet.is_some()
                    || iface.gateway.is_some()
                {
                    return Err(invalid("dhcp interfaces cannot carry static addressing"));
                }
            }
            IfaceKind::Manual | IfaceKind::Bond => {
                if !iface.addresses.is_empty() {
                    return Err(invalid("carrier interfaces cannot carry addresses"));
                }
            }
            IfaceKind::Vlan => match (iface.parent.as_deref(), iface.vlan_id) {
                (Some(parent), Some(id)) if !parent.is_empty() && (1..=4094).contains(&id) => {}
                _ => return Err(invalid("vlan interfaces need a parent and an id within 1-4094")),
            },
            IfaceKind::Dummy => {
                if iface.required_for_online {
                    return Err(invalid("dummy interfaces are never required for online"));
                }
            }
            IfaceKind::Tunnel => {
                if iface.addresses.is_empty() {
                    return Err(invalid("tunnel interfaces need at least one address"));
                }
            }
            IfaceKind::Static => {}
        }
        if iface.kind != IfaceKind::Bond && !iface.members.is_empty() {
            return Err(invalid("only bonds take member interfaces"));
        }
        if iface.ip_masquerading && iface.direction != Direction::Wan {
            return Err(invalid("masquerading is only legal on WAN interfaces"));
        }
        if let Some(subnet) = iface.subnet {
            if let Some(addr) = iface.addresses.iter().find(|a| !subnet.contains(**a)) {
                return Err(invalid(&format!("address {addr} is outside subnet {subnet}")));
            }
        }
        Ok(iface)
    }
}

fn is_valid_iface_name(name: &str) -> bool {
    (1..=15).contains(&name.len())
        && !name
            .chars()
            .any(|c| c == '/' || c == ':' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::{Direction, IfaceKind, InterfaceBuilder};
    use std::net::Ipv4Addr;

    #[test]
    fn dhcp_rejects_static_address() {
        let err = InterfaceBuilder::new("eth0", IfaceKind::Dhcp, Direction::Wan)
            .address(Ipv4Addr::new(192, 0, 2, 1))
            .build("router")
            .expect_err("illegal");
        assert!(err.to_string().contains("static addressing"));
    }

    #[test]
    fn masquerading_only_on_wan() {
        assert!(InterfaceBuilder::new("eth1", IfaceKind::Dhcp, Direction::Wan)
            .ip_masquerading(true)
            .build("router")
            .is_ok());
        assert!(InterfaceBuilder::new("eth0", IfaceKind::Manual, Direction::Lan)
            .ip_masquerading(true)
            .build("router")
            .is_err());
    }

    #[test]
    fn vlan_needs_parent_and_valid_id() {
        assert!(InterfaceBuilder::new("servers", IfaceKind::Vlan, Direction::Lan)
            .vlan("bond0", 10)
            .build("router")
            .is_ok());
        assert!(InterfaceBuilder::new("servers", IfaceKind::Vlan, Direction::Lan)
            .vlan("bond0", 4095)
            .build("router")
            .is_err());
        assert!(InterfaceBuilder::new("servers", IfaceKind::Vlan, Direction::Lan)
            .build("router")
            .is_err());
    }

    #[test]
    fn dummy_defaults_are_legal() {
        let dummy = InterfaceBuilder::new("lan0", IfaceKind::Dummy, Direction::Lan)
            .build("router")
            .expect("dummy");
        assert!(!dummy.required_for_online);
        assert_eq!(dummy.weight, 10);
    }
}
