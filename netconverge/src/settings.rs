//! Compiler settings.
//!
//! Settings come from an embedded `settings/default.toml`; a file given on the
//! command line replaces any key it sets and keeps the built-in value for the
//! rest.

use std::collections::BTreeMap;
use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::compiler::Mode;
use crate::model::MachineType;

/// How the address allocator decides an address is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicy {
    /// Any address on any interface of any machine is taken.
    NetworkWide,
    /// Only addresses of machines placed in the same subnet are taken.
    PerSubnet,
}

/// Which renderer turns the firewall model into on-disk rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallBackendKind {
    Iptables,
    Firewalld,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AllocationSettings {
    pub policy: AllocationPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct VlanSettings {
    pub base: Ipv4Addr,
    pub vlan: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SubnetSettings {
    pub prefix_len: u8,
    pub types: BTreeMap<MachineType, VlanSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FirewallSettings {
    pub backend: FirewallBackendKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EgressSettings {
    pub default_ports: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MacSettings {
    /// First three octets of generated MAC addresses.
    pub prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputSettings {
    pub modes: Vec<Mode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub allocation: AllocationSettings,
    pub subnets: SubnetSettings,
    pub firewall: FirewallSettings,
    pub egress: EgressSettings,
    pub mac: MacSettings,
    pub output: OutputSettings,
}

impl Default for SubnetSettings {
    fn default() -> Self {
        let types = [
            (MachineType::Server, [10, 10, 0, 0], 10),
            (MachineType::InternalOnly, [10, 20, 0, 0], 20),
            (MachineType::ExternalOnly, [10, 30, 0, 0], 30),
            (MachineType::User, [10, 40, 0, 0], 40),
            (MachineType::Admin, [10, 50, 0, 0], 50),
            (MachineType::Guest, [10, 250, 0, 0], 250),
        ]
        .into_iter()
        .map(|(t, base, vlan)| {
            (
                t,
                VlanSettings {
                    base: Ipv4Addr::from(base),
                    vlan,
                },
            )
        })
        .collect();
        Self {
            prefix_len: 24,
            types,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allocation: AllocationSettings {
                policy: AllocationPolicy::NetworkWide,
            },
            subnets: SubnetSettings::default(),
            firewall: FirewallSettings {
                backend: FirewallBackendKind::Iptables,
            },
            egress: EgressSettings {
                default_ports: vec![80, 443],
            },
            mac: MacSettings {
                prefix: "02:4e:43".to_string(),
            },
            output: OutputSettings {
                modes: vec![Mode::Audit, Mode::Config, Mode::Dryrun],
            },
        }
    }
}

impl Settings {
    /// Plan for a VLAN-eligible type, falling back to the built-in plan.
    pub fn vlan_for(&self, machine_type: MachineType) -> Option<VlanSettings> {
        self.subnets
            .types
            .get(&machine_type)
            .copied()
            .or_else(|| SubnetSettings::default().types.get(&machine_type).copied())
    }
}

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("settings file {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Load settings, returning them with a description of where they came from.
pub fn load_settings(path: Option<&Path>) -> Result<(Settings, String), SettingsError> {
    let Some(path) = path else {
        return Ok((embedded_settings(), "embedded".to_string()));
    };
    let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let settings = parse_settings(&raw, path.display().to_string())?;
    Ok((settings, format!("file:{}", path.display())))
}

/// Settings shipped with the binary.
pub fn embedded_settings() -> Settings {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/settings/default.toml"));
    parse_settings(raw, "embedded settings".to_string()).unwrap_or_default()
}

fn parse_settings(raw: &str, path: String) -> Result<Settings, SettingsError> {
    let settings: Settings = toml::from_str(raw).map_err(|source| SettingsError::Parse {
        path: path.clone(),
        source,
    })?;
    validate(&settings, &path)?;
    Ok(settings)
}

fn validate(settings: &Settings, path: &str) -> Result<(), SettingsError> {
    let invalid = |message: String| SettingsError::Invalid {
        path: path.to_string(),
        message,
    };
    if !(8..=30).contains(&settings.subnets.prefix_len) {
        return Err(invalid(format!(
            "subnets.prefix_len {} must be within 8-30",
            settings.subnets.prefix_len
        )));
    }
    for (machine_type, plan) in &settings.subnets.types {
        if !(1..=4094).contains(&plan.vlan) {
            return Err(invalid(format!(
                "subnets.types.{machine_type}.vlan {} must be within 1-4094",
                plan.vlan
            )));
        }
    }
    if settings.egress.default_ports.contains(&0) {
        return Err(invalid("egress.default_ports may not contain 0".to_string()));
    }
    if crate::model::mac::parse_prefix(&settings.mac.prefix).is_none() {
        return Err(invalid(format!(
            "mac.prefix '{}' must be three hex octets",
            settings.mac.prefix
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{embedded_settings, load_settings, AllocationPolicy, Settings};
    use crate::model::MachineType;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn embedded_file_matches_built_in_defaults() {
        assert_eq!(embedded_settings(), Settings::default());
    }

    #[test]
    fn override_file_keeps_defaults_for_missing_keys() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[allocation]\npolicy = \"per-subnet\"\n").expect("write");

        let (settings, source) = load_settings(Some(&path)).expect("load");
        assert_eq!(settings.allocation.policy, AllocationPolicy::PerSubnet);
        assert_eq!(settings.subnets.prefix_len, 24);
        assert!(source.starts_with("file:"));
        assert_eq!(
            settings.vlan_for(MachineType::Server).map(|p| p.vlan),
            Some(10)
        );
    }

    #[test]
    fn rejects_out_of_range_vlan() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(
            &path,
            "[subnets]\nprefix_len = 24\n[subnets.types.server]\nbase = \"10.10.0.0\"\nvlan = 5000\n",
        )
        .expect("write");
        assert!(load_settings(Some(&path)).is_err());
    }
}
