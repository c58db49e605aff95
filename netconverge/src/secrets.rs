//! Passphrases for generated account passwords.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::DataError;

/// Placeholder used when no store has an entry for a server.
pub const DEFAULT_PASSPHRASE: &str = "changeme";

/// Source of per-server passphrases.
pub trait SecretStore {
    /// Passphrase for `server`, or the store's default.
    fn get(&self, server: &str) -> String;
}

/// One passphrase for everything.
#[derive(Debug, Clone)]
pub struct StaticSecrets {
    passphrase: String,
}

impl StaticSecrets {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }
}

impl Default for StaticSecrets {
    fn default() -> Self {
        Self::new(DEFAULT_PASSPHRASE)
    }
}

impl SecretStore for StaticSecrets {
    fn get(&self, _server: &str) -> String {
        self.passphrase.clone()
    }
}

/// `{"default": "...", "servers": {"web": "..."}}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JsonSecrets {
    default: Option<String>,
    servers: BTreeMap<String, String>,
}

impl JsonSecrets {
    pub fn load(path: &Path) -> Result<Self, DataError> {
        let raw = fs::read_to_string(path).map_err(|source| DataError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| DataError::Json {
            path: path.display().to_string(),
            source,
        })
    }
}

impl SecretStore for JsonSecrets {
    fn get(&self, server: &str) -> String {
        self.servers
            .get(server)
            .or(self.default.as_ref())
            .cloned()
            .unwrap_or_else(|| DEFAULT_PASSPHRASE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{JsonSecrets, SecretStore, StaticSecrets, DEFAULT_PASSPHRASE};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn json_store_falls_back_to_default() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("secrets.json");
        fs::write(&path, r#"{"default": "hunter2", "servers": {"web": "s3cret"}}"#).expect("write");

        let store = JsonSecrets::load(&path).expect("load");
        assert_eq!(store.get("web"), "s3cret");
        assert_eq!(store.get("db"), "hunter2");
        assert_eq!(JsonSecrets::default().get("db"), DEFAULT_PASSPHRASE);
        assert_eq!(StaticSecrets::new("x").get("anything"), "x");
    }

    #[test]
    fn unreadable_store_is_a_data_error() {
        let dir = tempdir().expect("tempdir");
        assert!(JsonSecrets::load(&dir.path().join("missing.json")).is_err());
    }
}
