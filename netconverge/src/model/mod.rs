//! Typed network model: machines, interfaces, subnets and traffic intent.

mod iface;
pub mod mac;
mod machine;
pub mod machine_type;
mod network;
mod subnet;
pub mod traffic;

pub use iface::{Direction, IfaceKind, InterfaceBuilder, NetworkInterfaceModel};
pub use mac::MacAddress;
pub use machine::{
    DiskMedium, DiskSpec, LanConnection, MachineModel, ServiceSpec, UserAccount, WanConnection,
};
pub use machine_type::MachineType;
pub use network::{MachineId, NetworkGraph, DEFAULT_DOMAIN, SSH_PORT};
pub use subnet::{mask, Ipv4Net, Subnet};
pub use traffic::{split_target, Encapsulation, PortSet, Table, TrafficRule, ANY};
