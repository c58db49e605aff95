use std::net::Ipv4Addr;

use crate::error::TopologyError;
use crate::firewall::Endpoint;
use crate::model::{Ipv4Net, MachineId, NetworkGraph, ANY};
use crate::topology::Topology;

/// What a firewall target string refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Any,
    Net(Ipv4Net),
    Host(String),
    Machine(MachineId),
    Unknown,
}

/// Classify a target without looking at addresses. Labels win over
/// hostnames, so a label containing no dot is never taken for a host.
pub fn classify(graph: &NetworkGraph, raw: &str) -> Target {
    if raw == ANY {
        return Target::Any;
    }
    if let Some(id) = graph.id(raw) {
        return Target::Machine(id);
    }
    if let Ok(addr) = raw.parse::<Ipv4Addr>() {
        return Target::Net(Ipv4Net::host(addr));
    }
    if let Ok(net) = raw.parse::<Ipv4Net>() {
        return Target::Net(net);
    }
    if raw.contains('.') {
        return Target::Host(raw.to_string());
    }
    Target::Unknown
}

pub(super) struct Resolver<'a> {
    pub graph: &'a NetworkGraph,
    pub topology: &'a Topology,
}

impl Resolver<'_> {
    pub fn endpoints<I, S>(&self, label: &str, field: &str, targets: I) -> Result<Vec<Endpoint>, TopologyError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<Endpoint> = Vec::new();
        for target in targets {
            let target = target.as_ref();
            let resolved = match classify(self.graph, target) {
                Target::Any => vec![Endpoint::Any],
                Target::Net(net) => vec![Endpoint::Net(net)],
                Target::Host(host) => vec![Endpoint::Host(host)],
                Target::Machine(id) => self
                    .topology
                    .addresses_of(id)
                    .into_iter()
                    .map(|addr| Endpoint::Net(Ipv4Net::host(addr)))
                    .collect(),
                Target::Unknown => {
                    return Err(TopologyError::UnresolvedLabel {
                        label: label.to_string(),
                        field: field.to_string(),
                        reference: target.to_string(),
                    })
                }
            };
            for endpoint in resolved {
                if !out.contains(&endpoint) {
                    out.push(endpoint);
                }
            }
        }
        Ok(out)
    }
}
