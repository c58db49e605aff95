//! Input document: JSON with comments, keyed by network name.
//!
//! This layer only reads and shapes the input. Range checks and cross
//! references are validated when the machine graph is built, where the
//! offending label is known.

mod jsonc;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::DataError;

pub use jsonc::strip_comments;

/// One network as written in the input file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NetworkData {
    pub domain: Option<String>,
    pub upstreamdns: Vec<String>,
    pub adblocking: bool,
    pub autoguest: bool,
    pub autogenpasswds: bool,
    pub servers: BTreeMap<String, ServerData>,
    pub internaldevices: BTreeMap<String, DeviceData>,
    pub externaldevices: BTreeMap<String, DeviceData>,
    pub users: BTreeMap<String, UserData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerData {
    /// router / hypervisor / dedicated / service
    pub types: Vec<String>,
    pub hypervisor: Option<String>,
    pub admins: Vec<String>,
    pub connection: Option<String>,
    pub extconnection: Option<String>,
    pub debianmirror: Option<String>,
    pub debiandirectory: Option<String>,
    pub ram: Option<i64>,
    pub cpus: Option<i64>,
    pub disks: BTreeMap<String, DiskData>,
    pub backups: Option<i64>,
    pub cnames: Vec<String>,
    pub email: Option<String>,
    pub profiles: Vec<String>,
    pub networkinterfaces: InterfacesData,
    pub mac: Option<String>,
    pub firewall: FirewallData,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterfacesData {
    pub lan: BTreeMap<String, InterfaceData>,
    pub wan: BTreeMap<String, InterfaceData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterfaceData {
    pub mac: Option<String>,
    pub address: Option<String>,
    pub subnet: Option<String>,
    pub gateway: Option<String>,
    pub broadcast: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiskData {
    pub medium: Option<String>,
    pub format: Option<String>,
    pub filename: Option<String>,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FirewallData {
    pub listen: ListenData,
    pub allow_egress_to: Vec<String>,
    pub allow_ingress_from: Vec<String>,
    pub allow_forward_to: Vec<String>,
    pub dnat_to: Vec<String>,
    pub external_ip: Option<String>,
    pub throttle: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListenData {
    pub tcp: Vec<i64>,
    pub udp: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeviceData {
    pub macs: Vec<String>,
    pub throttle: bool,
    pub cnames: Vec<String>,
    pub email: Option<String>,
    pub allow_egress_to: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserData {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub sshkey: Option<String>,
    pub macs: Vec<String>,
}

/// Read every network in `path`, resolving `include` entries.
pub fn load_networks(path: &Path) -> Result<BTreeMap<String, NetworkData>, DataError> {
    let root = read_object(path)?;
    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut out = BTreeMap::new();
    for (name, entry) in root {
        let entry = resolve_include(&name, entry, &base)?;
        let network: NetworkData =
            serde_json::from_value(entry).map_err(|source| DataError::Json {
                path: format!("{} (network {name})", path.display()),
                source,
            })?;
        debug!(network = %name, servers = network.servers.len(), "loaded network");
        out.insert(name, network);
    }
    Ok(out)
}

/// Read one named network from `path`.
pub fn load_network(path: &Path, name: &str) -> Result<NetworkData, DataError> {
    load_networks(path)?
        .remove(name)
        .ok_or_else(|| DataError::NetworkNotFound {
            network: name.to_string(),
        })
}

/// Parse an in-memory document; includes are resolved relative to `base`.
pub fn parse_networks(raw: &str, base: &Path) -> Result<BTreeMap<String, NetworkData>, DataError> {
    let root = parse_object(raw, "<input>")?;
    let mut out = BTreeMap::new();
    for (name, entry) in root {
        let entry = resolve_include(&name, entry, base)?;
        let network: NetworkData =
            serde_json::from_value(entry).map_err(|source| DataError::Json {
                path: format!("<input> (network {name})"),
                source,
            })?;
        out.insert(name, network);
    }
    Ok(out)
}

fn read_object(path: &Path) -> Result<Map<String, Value>, DataError> {
    let raw = fs::read_to_string(path).map_err(|source| DataError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_object(&raw, &path.display().to_string())
}

fn parse_object(raw: &str, origin: &str) -> Result<Map<String, Value>, DataError> {
    let clean = strip_comments(raw).ok_or_else(|| DataError::InvalidValue {
        label: origin.to_string(),
        field: "comments".to_string(),
        value: "/*".to_string(),
        expected: "a terminated block comment".to_string(),
    })?;
    let value: Value = serde_json::from_str(&clean).map_err(|source| DataError::Json {
        path: origin.to_string(),
        source,
    })?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DataError::InvalidValue {
            label: origin.to_string(),
            field: "document".to_string(),
            value: "non-object".to_string(),
            expected: "an object keyed by network name".to_string(),
        }),
    }
}

/// Merge an included file under the entry's own keys. Included files may
/// not include again.
fn resolve_include(network: &str, entry: Value, base: &Path) -> Result<Value, DataError> {
    let Value::Object(mut entry) = entry else {
        return Err(DataError::InvalidValue {
            label: network.to_string(),
            field: "network".to_string(),
            value: "non-object".to_string(),
            expected: "an object".to_string(),
        });
    };
    let Some(include) = entry.remove("include") else {
        return Ok(Value::Object(entry));
    };
    let Value::String(include) = include else {
        return Err(DataError::Include {
            network: network.to_string(),
            path: include.to_string(),
            message: "include must be a string path".to_string(),
        });
    };

    let include_path: PathBuf = base.join(&include);
    let mut merged = read_object(&include_path).map_err(|err| DataError::Include {
        network: network.to_string(),
        path: include_path.display().to_string(),
        message: err.to_string(),
    })?;
    if merged.contains_key("include") {
        return Err(DataError::Include {
            network: network.to_string(),
            path: include_path.display().to_string(),
            message: "included files cannot include further files".to_string(),
        });
    }
    debug!(network, path = %include_path.display(), "merged include");
    for (key, value) in entry {
        merged.insert(key, value);
    }
    Ok(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::{load_network, load_networks, parse_networks};
    use crate::error::DataError;
    use std::fs;
    use std::path::Path;
    use tempfile::tempdir;

    #[test]
    fn parses_commented_document() {
        let raw = r#"{
            // lab network
            "lab": {
                "domain": "lab.example",
                "servers": { "router": { "types": ["router"] } },
                /* nobody yet */
                "users": {}
            }
        }"#;
        let networks = parse_networks(raw, Path::new(".")).expect("parse");
        let lab = &networks["lab"];
        assert_eq!(lab.domain.as_deref(), Some("lab.example"));
        assert_eq!(lab.servers["router"].types, vec!["router".to_string()]);
    }

    #[test]
    fn include_is_merged_and_entry_keys_win() {
        let dir = tempdir().expect("tempdir");
        fs::write(
            dir.path().join("lab.json"),
            r#"{ "domain": "inner.example", "adblocking": true }"#,
        )
        .expect("write include");
        let main = dir.path().join("main.json");
        fs::write(
            &main,
            r#"{ "lab": { "include": "lab.json", "domain": "outer.example" } }"#,
        )
        .expect("write main");

        let lab = load_network(&main, "lab").expect("load");
        assert_eq!(lab.domain.as_deref(), Some("outer.example"));
        assert!(lab.adblocking);
    }

    #[test]
    fn nested_include_is_rejected() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("a.json"), r#"{ "include": "b.json" }"#).expect("write");
        let main = dir.path().join("main.json");
        fs::write(&main, r#"{ "lab": { "include": "a.json" } }"#).expect("write");

        let err = load_networks(&main).expect_err("nested");
        assert!(matches!(err, DataError::Include { .. }));
    }

    #[test]
    fn missing_network_is_reported() {
        let dir = tempdir().expect("tempdir");
        let main = dir.path().join("main.json");
        fs::write(&main, r#"{ "lab": {} }"#).expect("write");
        assert!(matches!(
            load_network(&main, "prod"),
            Err(DataError::NetworkNotFound { .. })
        ));
    }
}
