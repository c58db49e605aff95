use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of roles a machine can hold. A machine may hold several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    Router,
    Server,
    Hypervisor,
    Dedicated,
    Service,
    Device,
    User,
    InternalOnly,
    ExternalOnly,
    Admin,
    Guest,
    Vpn,
    Internet,
}

/// Types that get a VLAN of their own, in allocation order.
pub const VLAN_ELIGIBLE: [MachineType; 6] = [
    MachineType::Server,
    MachineType::InternalOnly,
    MachineType::ExternalOnly,
    MachineType::User,
    MachineType::Admin,
    MachineType::Guest,
];

/// Priority used when a machine holds several VLAN-eligible types.
pub const PLACEMENT_PRIORITY: [MachineType; 6] = [
    MachineType::Server,
    MachineType::Admin,
    MachineType::User,
    MachineType::InternalOnly,
    MachineType::ExternalOnly,
    MachineType::Guest,
];

impl MachineType {
    pub const ALL: [MachineType; 13] = [
        MachineType::Router,
        MachineType::Server,
        MachineType::Hypervisor,
        MachineType::Dedicated,
        MachineType::Service,
        MachineType::Device,
        MachineType::User,
        MachineType::InternalOnly,
        MachineType::ExternalOnly,
        MachineType::Admin,
        MachineType::Guest,
        MachineType::Vpn,
        MachineType::Internet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MachineType::Router => "router",
            MachineType::Server => "server",
            MachineType::Hypervisor => "hypervisor",
            MachineType::Dedicated => "dedicated",
            MachineType::Service => "service",
            MachineType::Device => "device",
            MachineType::User => "user",
            MachineType::InternalOnly => "internalonly",
            MachineType::ExternalOnly => "externalonly",
            MachineType::Admin => "admin",
            MachineType::Guest => "guest",
            MachineType::Vpn => "vpn",
            MachineType::Internet => "internet",
        }
    }

    /// Name of the VLAN interface carrying this type.
    pub fn vlan_iface(self) -> &'static str {
        match self {
            MachineType::Server => "servers",
            MachineType::User => "users",
            MachineType::Admin => "admins",
            MachineType::Guest => "guests",
            other => other.as_str(),
        }
    }

    /// True for physical machines that must bring their own MAC.
    pub fn requires_mac(self) -> bool {
        matches!(
            self,
            MachineType::Device | MachineType::Dedicated | MachineType::Hypervisor
        )
    }
}

impl Display for MachineType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MachineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        MachineType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown machine type '{s}'"))
    }
}
