//! Shared fixtures for unit tests.

use std::path::Path;

use crate::compiler::CompiledNetwork;
use crate::data::parse_networks;
use crate::settings::Settings;

/// Router with one LAN port and one WAN port, a hypervisor hosting a web
/// service, and a user with a laptop who administers the hypervisor.
pub const LAB: &str = r#"{"lab": {
    "adblocking": true,
    "autogenpasswds": true,
    "servers": {
        "router": {"types": ["router"], "networkinterfaces": {"lan": {"eth0": {}}, "wan": {"eth1": {}}}},
        "hv": {"types": ["hypervisor"], "mac": "aa:bb:cc:00:00:10", "admins": ["alice"],
            "firewall": {"listen": {"tcp": [22]}}},
        "websrv": {"types": ["service"], "hypervisor": "hv", "cnames": ["www"], "backups": 6,
            "firewall": {"listen": {"tcp": [443]}, "allow_egress_to": ["deb.debian.org:443"]}}
    },
    "users": {"alice": {"fullname": "Alice Example", "sshkey": "ssh-ed25519 AAAA alice@laptop",
        "macs": ["aa:bb:cc:00:00:01"]}}
}}"#;

pub fn compiled(raw: &str) -> CompiledNetwork {
    compiled_with(raw, Settings::default())
}

pub fn compiled_with(raw: &str, settings: Settings) -> CompiledNetwork {
    let networks = parse_networks(raw, Path::new(".")).expect("parse");
    CompiledNetwork::build("lab", &networks["lab"], settings).expect("compile")
}
