use std::fmt::{self, Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::Serialize;

use crate::model::MachineType;

/// An IPv4 network in CIDR form. The stored address always has its host
/// bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Ipv4Net {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Ipv4Net {
    /// Build a network from any address inside it. `None` if `prefix_len > 32`.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Option<Self> {
        let mask = mask(prefix_len)?;
        Some(Self {
            network: Ipv4Addr::from(u32::from(addr) & mask),
            prefix_len,
        })
    }

    /// A single address as a `/32`.
    pub fn host(addr: Ipv4Addr) -> Self {
        Self {
            network: addr,
            prefix_len: 32,
        }
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn netmask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask(self.prefix_len).unwrap_or(0))
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        let host_bits = !mask(self.prefix_len).unwrap_or(0);
        Ipv4Addr::from(u32::from(self.network) | host_bits)
    }

    /// First usable host: the network address plus one.
    pub fn first_host(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.network).saturating_add(1))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let mask = mask(self.prefix_len).unwrap_or(0);
        u32::from(addr) & mask == u32::from(self.network)
    }

    pub fn overlaps(&self, other: &Ipv4Net) -> bool {
        self.contains(other.network) || other.contains(self.network)
    }

    /// The same-sized network immediately after this one, if any.
    pub fn next_block(&self) -> Option<Ipv4Net> {
        let size = 1u64 << (32 - u32::from(self.prefix_len));
        let next = u64::from(u32::from(self.network)) + size;
        let next = u32::try_from(next).ok()?;
        Ipv4Net::new(Ipv4Addr::from(next), self.prefix_len)
    }

    /// Usable hosts after `start`, in ascending order, broadcast excluded.
    pub fn hosts_after(&self, start: Ipv4Addr) -> impl Iterator<Item = Ipv4Addr> {
        let from = u32::from(start).saturating_add(1);
        let to = u32::from(self.broadcast());
        (from..to).map(Ipv4Addr::from)
    }
}

impl Display for Ipv4Net {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}

impl FromStr for Ipv4Net {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.trim().split_once('/').ok_or(())?;
        let addr: Ipv4Addr = addr.parse().map_err(|_| ())?;
        let prefix: u8 = prefix.parse().map_err(|_| ())?;
        Ipv4Net::new(addr, prefix).ok_or(())
    }
}

/// Subnet mask for a prefix length, `None` above 32.
pub fn mask(prefix_len: u8) -> Option<u32> {
    match prefix_len {
        0 => Some(0),
        1..=32 => Some(u32::MAX << (32 - u32::from(prefix_len))),
        _ => None,
    }
}

/// The subnet and VLAN carrying one machine type behind the router.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subnet {
    pub machine_type: MachineType,
    pub net: Ipv4Net,
    pub vlan_id: u16,
    /// VLAN interface name on the router.
    pub iface: String,
    /// Router address on this VLAN; first host of `net`.
    pub gateway: Ipv4Addr,
}
