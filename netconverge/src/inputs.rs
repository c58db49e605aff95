use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use netconverge::data::{load_networks, NetworkData};
use netconverge::secrets::{JsonSecrets, SecretStore, StaticSecrets};
use netconverge::settings::{load_settings, Settings};
use tracing::debug;

pub fn settings(path: Option<&Path>) -> Result<Settings> {
    let (settings, source) = load_settings(path).context("failed to load settings")?;
    debug!(%source, "settings loaded");
    Ok(settings)
}

pub fn secrets(path: Option<&Path>) -> Result<Box<dyn SecretStore>> {
    match path {
        Some(path) => {
            let store = JsonSecrets::load(path)
                .with_context(|| format!("failed to load secrets from {}", path.display()))?;
            Ok(Box::new(store))
        }
        None => Ok(Box::new(StaticSecrets::default())),
    }
}

/// Every network in `input`, or only `network` when given.
pub fn networks(input: &Path, network: Option<&str>) -> Result<BTreeMap<String, NetworkData>> {
    let mut all = load_networks(input)
        .with_context(|| format!("failed to load {}", input.display()))?;
    match network {
        None => Ok(all),
        Some(name) => match all.remove(name) {
            Some(data) => Ok(BTreeMap::from([(name.to_string(), data)])),
            None => bail!("network '{name}' not found in {}", input.display()),
        },
    }
}

/// One network: the named one, or the only one in the file.
pub fn one_network(input: &Path, network: Option<&str>) -> Result<(String, NetworkData)> {
    let mut selected = networks(input, network)?;
    if selected.len() > 1 {
        let names: Vec<&str> = selected.keys().map(String::as_str).collect();
        bail!(
            "{} holds several networks ({}), pick one with --network",
            input.display(),
            names.join(", ")
        );
    }
    selected
        .pop_first()
        .with_context(|| format!("{} holds no networks", input.display()))
}
