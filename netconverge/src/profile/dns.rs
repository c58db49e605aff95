//! Unbound resolver on the router.
//!
//! Every machine with an address gets an A and PTR record under the network
//! domain; CNAMEs point at the owning machine. Everything else is forwarded
//! upstream.

use std::fmt::Write as _;

use crate::error::Error;
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{
    file_content, key, package_installed, service_enabled, service_running,
};
use crate::unit::Unit;

const PACKAGE: &str = "unbound";
const CONF_PATH: &str = "/etc/unbound/unbound.conf.d/netconverge.conf";
const ADBLOCK_PATH: &str = "/etc/unbound/adblock.conf";

pub struct DnsServer;

fn build() -> Box<dyn Profile> {
    Box::new(DnsServer)
}

inventory::submit! {
    ProfileRegistration { name: "dns-server", build }
}

/// One `A` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub fqdn: String,
    pub address: std::net::Ipv4Addr,
}

/// Records for every machine, in graph order. The router answers for its
/// own name with its first gateway.
pub fn host_records(ctx: &ProfileContext<'_>) -> Vec<HostRecord> {
    let graph = &ctx.net.graph;
    let topology = &ctx.net.topology;
    graph
        .machines()
        .filter_map(|(id, machine)| {
            let address = topology.addresses_of(id).into_iter().next()?;
            Some(HostRecord {
                fqdn: machine.fqdn.clone(),
                address,
            })
        })
        .collect()
}

pub fn unbound_conf(ctx: &ProfileContext<'_>) -> String {
    let graph = &ctx.net.graph;
    let topology = &ctx.net.topology;
    let domain = &graph.domain;
    let mut out = String::from("server:\n");
    out.push_str("    interface: 127.0.0.1\n");
    for subnet in &topology.subnets {
        let _ = writeln!(out, "    interface: {}", subnet.gateway);
    }
    out.push_str("    access-control: 127.0.0.0/8 allow\n");
    for subnet in &topology.subnets {
        let _ = writeln!(out, "    access-control: {} allow", subnet.net);
    }
    let _ = writeln!(out, "    private-domain: \"{domain}\"");
    let _ = writeln!(out, "    local-zone: \"{domain}.\" static");
    for record in host_records(ctx) {
        let _ = writeln!(out, "    local-data: \"{}. IN A {}\"", record.fqdn, record.address);
        let _ = writeln!(out, "    local-data-ptr: \"{} {}\"", record.address, record.fqdn);
    }
    for (_, machine) in graph.machines() {
        for cname in &machine.cnames {
            let name = if cname.contains('.') {
                cname.clone()
            } else {
                format!("{cname}.{domain}")
            };
            let _ = writeln!(out, "    local-data: \"{name}. IN CNAME {}.\"", machine.fqdn);
        }
    }
    if graph.adblocking {
        let _ = writeln!(out, "    include: \"{ADBLOCK_PATH}\"");
    }
    out.push_str("\nforward-zone:\n    name: \".\"\n");
    for upstream in &graph.upstream_dns {
        let _ = writeln!(out, "    forward-addr: {upstream}");
    }
    out
}

impl Profile for DnsServer {
    fn name(&self) -> &'static str {
        "dns-server"
    }

    fn install(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(vec![package_installed(PACKAGE)])
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let package = package_installed(PACKAGE).label().to_string();
        let mut units = Vec::new();
        if ctx.net.graph.adblocking {
            let q = script_doc::shell_quote(ADBLOCK_PATH);
            units.push(
                Unit::new(
                    "adblock_list",
                    format!("test -f {q} && echo yes"),
                    "yes",
                    format!("touch {q}"),
                )
                .after(&package)
                .message(format!("{ADBLOCK_PATH} is missing")),
            );
        }
        units.push(file_content(CONF_PATH, &unbound_conf(ctx)).after(&package));
        Ok(units)
    }

    fn live_config(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let enabled = service_enabled(PACKAGE).after(format!("file_{}", key(CONF_PATH)));
        let running = service_running(PACKAGE).after(enabled.label());
        let checked = Unit::singleton(
            "unbound_conf_valid",
            "unbound-checkconf >/dev/null 2>&1 && echo ok",
            "ok",
        )
        .after(running.label())
        .message("unbound-checkconf rejects the configuration");
        Ok(vec![enabled, running, checked])
    }
}

#[cfg(test)]
mod tests {
    use super::unbound_conf;
    use crate::profile::ProfileContext;
    use crate::secrets::StaticSecrets;
    use crate::testutil::{compiled, LAB};

    #[test]
    fn conf_holds_records_cnames_and_forwarders() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("router").expect("id"),
            secrets: &secrets,
        };
        let conf = unbound_conf(&ctx);
        assert!(conf.contains("    interface: 10.10.0.1\n"));
        assert!(conf.contains("    local-zone: \"lan.\" static\n"));
        assert!(conf.contains("    local-data: \"router.lan. IN A 10.10.0.1\"\n"));
        assert!(conf.contains("    local-data: \"websrv.lan. IN A 10.10.0.3\"\n"));
        assert!(conf.contains("    local-data-ptr: \"10.50.0.2 alice.lan\"\n"));
        assert!(conf.contains("    local-data: \"www.lan. IN CNAME websrv.lan.\"\n"));
        assert!(conf.contains("    include: \"/etc/unbound/adblock.conf\"\n"));
        assert!(conf.ends_with("forward-zone:\n    name: \".\"\n    forward-addr: 9.9.9.9\n    forward-addr: 149.112.112.112\n"));
    }
}
