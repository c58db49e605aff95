//! Profiles: per-machine unit producers.
//!
//! Every profile registers a constructor under a fixed name with
//! `inventory`, so the set of names an input file may use is closed and
//! known at link time.

mod admins;
mod base;
mod dhcp;
mod dns;
mod firewall;
mod hypervisor;
mod networkd;
mod router;
mod upgrades;

use std::collections::BTreeSet;

use serde::Serialize;

use crate::compiler::CompiledNetwork;
use crate::error::{DataError, Error};
use crate::model::{MachineId, MachineModel, MachineType};
use crate::secrets::SecretStore;
use crate::unit::Unit;

/// Install-to-live ordering of a machine's units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Install,
    PersistentConfig,
    PersistentFirewall,
    LiveConfig,
    LiveFirewall,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Install,
        Phase::PersistentConfig,
        Phase::PersistentFirewall,
        Phase::LiveConfig,
        Phase::LiveFirewall,
    ];
}

/// What a profile may look at. Everything is borrowed from the compiled
/// network and read-only.
pub struct ProfileContext<'a> {
    pub net: &'a CompiledNetwork,
    pub id: MachineId,
    pub secrets: &'a dyn SecretStore,
}

impl<'a> ProfileContext<'a> {
    pub fn machine(&self) -> &'a MachineModel {
        self.net.graph.machine(self.id)
    }

    pub fn label(&self) -> &'a str {
        &self.machine().label
    }
}

/// Produces a machine's units, one phase at a time.
pub trait Profile {
    fn name(&self) -> &'static str;

    fn install(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(Vec::new())
    }

    fn persistent_config(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(Vec::new())
    }

    fn persistent_firewall(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(Vec::new())
    }

    fn live_config(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(Vec::new())
    }

    fn live_firewall(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(Vec::new())
    }

    fn units(&self, ctx: &ProfileContext<'_>, phase: Phase) -> Result<Vec<Unit>, Error> {
        match phase {
            Phase::Install => self.install(ctx),
            Phase::PersistentConfig => self.persistent_config(ctx),
            Phase::PersistentFirewall => self.persistent_firewall(ctx),
            Phase::LiveConfig => self.live_config(ctx),
            Phase::LiveFirewall => self.live_firewall(ctx),
        }
    }
}

/// A named profile constructor collected at link time.
pub struct ProfileRegistration {
    pub name: &'static str,
    pub build: fn() -> Box<dyn Profile>,
}

inventory::collect!(ProfileRegistration);

/// Construct a registered profile by name.
pub fn lookup(name: &str) -> Option<Box<dyn Profile>> {
    inventory::iter::<ProfileRegistration>
        .into_iter()
        .find(|reg| reg.name == name)
        .map(|reg| (reg.build)())
}

/// Every registered profile name, sorted.
pub fn registered_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = inventory::iter::<ProfileRegistration>
        .into_iter()
        .map(|reg| reg.name)
        .collect();
    names.sort_unstable();
    names
}

/// Whether the compiler writes scripts for this machine at all. Devices
/// and people are not managed hosts.
pub fn is_managed(machine: &MachineModel) -> bool {
    machine.is_router() || machine.is(MachineType::Server)
}

/// Profile names applied to a machine: defaults by type, then any extra
/// names from the input, each name once.
pub fn profile_names(machine: &MachineModel) -> Vec<String> {
    let mut names: Vec<&str> = vec!["base", "admins", "networkd"];
    if machine.is_router() {
        names.push("router");
    } else {
        names.push("host-firewall");
    }
    if machine.is(MachineType::Hypervisor) {
        names.push("hypervisor");
    }
    names.push("unattended-upgrades");

    let mut seen = BTreeSet::new();
    names
        .into_iter()
        .map(str::to_string)
        .chain(machine.profiles.iter().cloned())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Resolve a machine's profiles, failing on the first unknown name.
pub fn resolve_profiles(machine: &MachineModel) -> Result<Vec<Box<dyn Profile>>, DataError> {
    profile_names(machine)
        .into_iter()
        .map(|name| {
            lookup(&name).ok_or_else(|| DataError::UnknownProfile {
                label: machine.label.clone(),
                profile: name,
            })
        })
        .collect()
}

/// All units for one machine: phases in order, profiles in order within
/// each phase.
pub fn machine_units(ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
    let profiles = resolve_profiles(ctx.machine())?;
    let mut units = Vec::new();
    for phase in Phase::ALL {
        for profile in &profiles {
            units.extend(profile.units(ctx, phase)?);
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::{lookup, profile_names, registered_names};

    #[test]
    fn registry_holds_every_builtin_profile() {
        let names = registered_names();
        for expected in [
            "admins",
            "base",
            "dhcp-server",
            "dns-server",
            "host-firewall",
            "hypervisor",
            "networkd",
            "router",
            "router-firewall",
            "unattended-upgrades",
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
        assert!(lookup("webserver").is_none());
        assert_eq!(lookup("dns-server").map(|p| p.name()), Some("dns-server"));
    }

    #[test]
    fn extra_profiles_are_appended_once() {
        let net = crate::testutil::compiled(crate::testutil::LAB);
        let mut machine = net.graph.get("websrv").expect("websrv").clone();
        machine.profiles = vec!["unattended-upgrades".to_string(), "dns-server".to_string()];
        let names = profile_names(&machine);
        assert_eq!(names.iter().filter(|n| *n == "unattended-upgrades").count(), 1);
        assert_eq!(names.last().map(String::as_str), Some("dns-server"));
    }
}
