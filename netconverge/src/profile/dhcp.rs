//! ISC DHCP server on the router.

use std::fmt::Write as _;

use crate::error::Error;
use crate::model::MachineType;
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{
    file_content, key, package_installed, service_enabled, service_running,
};
use crate::unit::Unit;

const PACKAGE: &str = "isc-dhcp-server";
const CONF_PATH: &str = "/etc/dhcp/dhcpd.conf";
const DEFAULTS_PATH: &str = "/etc/default/isc-dhcp-server";

pub struct DhcpServer;

fn build() -> Box<dyn Profile> {
    Box::new(DhcpServer)
}

inventory::submit! {
    ProfileRegistration { name: "dhcp-server", build }
}

/// `dhcpd.conf`: one block per subnet, then a fixed reservation per
/// assigned interface. Only the guest subnet hands out dynamic leases.
pub fn dhcpd_conf(ctx: &ProfileContext<'_>) -> String {
    let graph = &ctx.net.graph;
    let topology = &ctx.net.topology;
    let mut out = String::new();
    let _ = writeln!(out, "# {}: generated by netconverge", ctx.label());
    let _ = writeln!(out, "option domain-name \"{}\";", graph.domain);
    out.push_str("default-lease-time 3600;\nmax-lease-time 86400;\nauthoritative;\n");

    for subnet in &topology.subnets {
        let _ = writeln!(
            out,
            "\nsubnet {} netmask {} {{",
            subnet.net.network(),
            subnet.net.netmask()
        );
        let _ = writeln!(out, "    option routers {};", subnet.gateway);
        let _ = writeln!(out, "    option domain-name-servers {};", subnet.gateway);
        let _ = writeln!(out, "    option broadcast-address {};", subnet.net.broadcast());
        if subnet.machine_type == MachineType::Guest {
            let taken = topology
                .assignments()
                .iter()
                .filter(|a| a.subnet == MachineType::Guest)
                .map(|a| a.address)
                .max()
                .unwrap_or(subnet.gateway);
            let mut free = subnet.net.hosts_after(taken);
            if let Some(first) = free.next() {
                let last = free.last().unwrap_or(first);
                let _ = writeln!(out, "    range {first} {last};");
            }
        }
        out.push_str("}\n");
    }

    for lease in topology.leases(graph) {
        let _ = writeln!(out, "\nhost {}-{} {{", lease.label, lease.iface);
        let _ = writeln!(out, "    hardware ethernet {};", lease.mac);
        let _ = writeln!(out, "    fixed-address {};", lease.address);
        let _ = writeln!(out, "    option host-name \"{}\";", lease.label);
        out.push_str("}\n");
    }
    out
}

fn defaults_file(ctx: &ProfileContext<'_>) -> String {
    let ifaces: Vec<&str> = ctx
        .net
        .topology
        .vlans
        .iter()
        .map(|v| v.name.as_str())
        .collect();
    format!("INTERFACESv4=\"{}\"\nINTERFACESv6=\"\"\n", ifaces.join(" "))
}

impl Profile for DhcpServer {
    fn name(&self) -> &'static str {
        "dhcp-server"
    }

    fn install(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(vec![package_installed(PACKAGE)])
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let package = package_installed(PACKAGE).label().to_string();
        Ok(vec![
            file_content(CONF_PATH, &dhcpd_conf(ctx)).after(&package),
            file_content(DEFAULTS_PATH, &defaults_file(ctx)).after(&package),
        ])
    }

    fn live_config(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let enabled = service_enabled(PACKAGE).after(format!("file_{}", key(CONF_PATH)));
        let running = service_running(PACKAGE).after(enabled.label());
        let running_label = running.label().to_string();
        Ok(vec![
            enabled,
            running,
            Unit::singleton(
                "dhcpd_conf_valid",
                format!("dhcpd -t -cf {CONF_PATH} >/dev/null 2>&1 && echo ok"),
                "ok",
            )
            .after(running_label)
            .message(format!("{CONF_PATH} does not parse")),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::dhcpd_conf;
    use crate::profile::ProfileContext;
    use crate::secrets::StaticSecrets;
    use crate::settings::Settings;
    use crate::testutil::{compiled, compiled_with, LAB};

    #[test]
    fn conf_has_subnets_and_reservations() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("router").expect("id"),
            secrets: &secrets,
        };
        let conf = dhcpd_conf(&ctx);
        assert!(conf.contains("subnet 10.10.0.0 netmask 255.255.255.0 {\n    option routers 10.10.0.1;\n"));
        assert!(conf.contains("subnet 10.50.0.0 netmask 255.255.255.0 {"));
        assert!(conf.contains("host hv-lan0 {\n    hardware ethernet aa:bb:cc:00:00:10;\n    fixed-address 10.10.0.2;\n"));
        assert!(conf.contains("host alice-lan0 {\n    hardware ethernet aa:bb:cc:00:00:01;\n    fixed-address 10.50.0.2;\n"));
        assert!(!conf.contains("range"));
    }

    #[test]
    fn guest_subnet_gets_a_dynamic_range() {
        let net = compiled(
            r#"{"lab": {"autoguest": true, "servers": {
                "router": {"types": ["router"]}
            }, "internaldevices": {"printer": {"macs": ["aa:bb:cc:00:00:20"]}}}}"#,
        );
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("router").expect("id"),
            secrets: &secrets,
        };
        let conf = dhcpd_conf(&ctx);
        assert!(conf.contains("subnet 10.20.0.0 netmask 255.255.255.0 {"));
        assert!(conf.contains("subnet 10.250.0.0 netmask 255.255.255.0 {"));
        assert!(conf.contains("    range 10.250.0.2 10.250.0.254;\n"));
        assert_eq!(conf.matches("range").count(), 1);
    }

    #[test]
    fn single_free_guest_address_is_still_a_range() {
        let mut settings = Settings::default();
        settings.subnets.prefix_len = 30;
        let net = compiled_with(
            r#"{"lab": {"autoguest": true, "servers": {"router": {"types": ["router"]}}}}"#,
            settings,
        );
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("router").expect("id"),
            secrets: &secrets,
        };
        let conf = dhcpd_conf(&ctx);
        assert!(conf.contains("subnet 10.250.0.0 netmask 255.255.255.252 {"));
        assert!(conf.contains("    range 10.250.0.2 10.250.0.2;\n"));
    }
}
