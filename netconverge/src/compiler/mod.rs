//! Whole-network compilation.
//!
//! `CompiledNetwork::build` runs the global passes once: graph, topology,
//! firewall plan. Per-machine scripts are then rendered from that value
//! without touching it again, so every machine's script sees the same
//! addresses and rules.

mod mode;
pub mod script;

use serde::Serialize;
use tracing::{debug, info};

use crate::data::NetworkData;
use crate::error::{Error, Result};
use crate::firewall::{backend, FirewallBackend, FirewallPlan};
use crate::model::{MachineId, NetworkGraph};
use crate::profile::{is_managed, machine_units, ProfileContext};
use crate::secrets::SecretStore;
use crate::settings::Settings;
use crate::topology::Topology;
use crate::unit::Unit;

pub use mode::Mode;

/// A network after every global pass has run.
#[derive(Debug, Clone, Serialize)]
pub struct CompiledNetwork {
    pub graph: NetworkGraph,
    pub topology: Topology,
    pub firewall: FirewallPlan,
    #[serde(skip)]
    pub settings: Settings,
}

impl CompiledNetwork {
    pub fn build(name: &str, data: &NetworkData, settings: Settings) -> Result<Self> {
        let graph = NetworkGraph::build(name, data, &settings)?;
        let topology = Topology::build(&graph, &settings)?;
        let firewall = FirewallPlan::build(&graph, &topology)?;
        debug!(network = name, machines = graph.len(), "global passes complete");
        Ok(Self {
            graph,
            topology,
            firewall,
            settings,
        })
    }

    pub fn backend(&self) -> Box<dyn FirewallBackend> {
        backend(self.settings.firewall.backend)
    }

    /// Machines that get scripts, in graph order.
    pub fn managed(&self) -> Vec<MachineId> {
        self.graph
            .machines()
            .filter(|(_, m)| is_managed(m))
            .map(|(id, _)| id)
            .collect()
    }

    /// The ordered, checked unit list for one machine.
    pub fn units(&self, id: MachineId, secrets: &dyn SecretStore) -> Result<Vec<Unit>> {
        let ctx = ProfileContext {
            net: self,
            id,
            secrets,
        };
        let units = machine_units(&ctx)?;
        script::check_units(ctx.label(), &units)?;
        Ok(units)
    }
}

/// One rendered script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineScript {
    pub machine: String,
    pub mode: Mode,
    pub units: usize,
    pub text: String,
}

impl MachineScript {
    /// `<machine>.<mode>.sh`
    pub fn file_name(&self) -> String {
        format!("{}.{}.sh", self.machine, self.mode)
    }
}

/// Render one machine in each requested mode.
pub fn compile_machine(
    net: &CompiledNetwork,
    id: MachineId,
    modes: &[Mode],
    secrets: &dyn SecretStore,
) -> Result<Vec<MachineScript>> {
    let label = net.graph.machine(id).label.as_str();
    let units = net.units(id, secrets)?;
    modes
        .iter()
        .map(|mode| {
            let doc = script::render_script(label, &units, *mode)?;
            Ok(MachineScript {
                machine: label.to_string(),
                mode: *mode,
                units: units.len(),
                text: script_doc::render(&doc),
            })
        })
        .collect()
}

/// Render every managed machine, or only `only` when given.
pub fn compile_all(
    net: &CompiledNetwork,
    modes: &[Mode],
    secrets: &dyn SecretStore,
    only: Option<&str>,
) -> Result<Vec<MachineScript>> {
    let mut out = Vec::new();
    for id in net.managed() {
        let label = &net.graph.machine(id).label;
        if only.is_some_and(|wanted| wanted != label) {
            continue;
        }
        let scripts = compile_machine(net, id, modes, secrets)?;
        info!(
            machine = %label,
            units = scripts.first().map_or(0, |s| s.units),
            "compiled"
        );
        out.extend(scripts);
    }
    Ok(out)
}

/// Convenience for callers holding raw input.
pub fn compile_network(
    name: &str,
    data: &NetworkData,
    settings: Settings,
    secrets: &dyn SecretStore,
) -> std::result::Result<Vec<MachineScript>, Error> {
    let modes = settings.output.modes.clone();
    let net = CompiledNetwork::build(name, data, settings)?;
    compile_all(&net, &modes, secrets, None)
}

#[cfg(test)]
mod tests {
    use super::{compile_all, CompiledNetwork, Mode};
    use crate::secrets::StaticSecrets;
    use crate::testutil::{compiled, LAB};
    use pretty_assertions::assert_eq;

    #[test]
    fn compiling_twice_is_byte_identical() {
        let secrets = StaticSecrets::default();
        let first = compile_all(&compiled(LAB), &Mode::ALL, &secrets, None).expect("first");
        let second = compile_all(&compiled(LAB), &Mode::ALL, &secrets, None).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn only_managed_machines_get_scripts() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let scripts = compile_all(&net, &[Mode::Config], &secrets, None).expect("compile");
        let machines: Vec<&str> = scripts.iter().map(|s| s.machine.as_str()).collect();
        assert_eq!(machines, vec!["hv", "router", "websrv"]);
        assert_eq!(scripts[0].file_name(), "hv.config.sh");
    }

    #[test]
    fn filter_selects_a_single_machine() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let scripts = compile_all(&net, &Mode::ALL, &secrets, Some("websrv")).expect("compile");
        assert_eq!(scripts.len(), 3);
        assert!(scripts.iter().all(|s| s.machine == "websrv"));
    }

    #[test]
    fn every_precondition_is_rendered_first() {
        let net: CompiledNetwork = compiled(LAB);
        let secrets = StaticSecrets::default();
        for id in net.managed() {
            let units = net.units(id, &secrets).expect("units");
            assert!(!units.is_empty());
        }
    }

    #[test]
    fn service_without_listen_ports_has_no_ingress_accept() {
        let net = compiled(
            r#"{"lab": {"servers": {
                "router": {"types": ["router"], "networkinterfaces": {"lan": {"eth0": {}}, "wan": {"eth1": {}}}},
                "hv": {"types": ["hypervisor"], "mac": "aa:bb:cc:00:00:10"},
                "websrv": {"types": ["service"], "hypervisor": "hv"}
            }}}"#,
        );
        let secrets = StaticSecrets::default();
        let scripts = compile_all(&net, &[Mode::Config], &secrets, Some("router")).expect("compile");
        let router = &scripts[0].text;
        assert!(router.contains(":INPUT DROP [0:0]"));
        assert!(!router.contains("websrv_ingress"));

        let lab = compiled(LAB);
        let scripts = compile_all(&lab, &[Mode::Config], &secrets, Some("router")).expect("compile");
        assert!(scripts[0].text.contains("-A websrv_ingress -p tcp --dport 443 -j ACCEPT"));
    }
}
