use crate::error::Error;
use crate::profile::dhcp::DhcpServer;
use crate::profile::dns::DnsServer;
use crate::profile::firewall::Firewall;
use crate::profile::{Phase, Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{file_content, sysctl};
use crate::unit::Unit;

const SYSCTL_PATH: &str = "/etc/sysctl.d/90-netconverge.conf";

/// Forwarding plus the services every router runs: DHCP, DNS and the full
/// firewall.
pub struct Router {
    parts: Vec<Box<dyn Profile>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            parts: vec![
                Box::new(DhcpServer),
                Box::new(DnsServer),
                Box::new(Firewall::router()),
            ],
        }
    }

    fn with_parts(
        &self,
        ctx: &ProfileContext<'_>,
        phase: Phase,
        mut own: Vec<Unit>,
    ) -> Result<Vec<Unit>, Error> {
        for part in &self.parts {
            own.extend(part.units(ctx, phase)?);
        }
        Ok(own)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn build() -> Box<dyn Profile> {
    Box::new(Router::new())
}

inventory::submit! {
    ProfileRegistration { name: "router", build }
}

impl Profile for Router {
    fn name(&self) -> &'static str {
        "router"
    }

    fn install(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        self.with_parts(ctx, Phase::Install, Vec::new())
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let own = vec![file_content(SYSCTL_PATH, "net.ipv4.ip_forward = 1")];
        self.with_parts(ctx, Phase::PersistentConfig, own)
    }

    fn persistent_firewall(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        self.with_parts(ctx, Phase::PersistentFirewall, Vec::new())
    }

    fn live_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let own = vec![sysctl("net.ipv4.ip_forward", "1")];
        self.with_parts(ctx, Phase::LiveConfig, own)
    }

    fn live_firewall(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        self.with_parts(ctx, Phase::LiveFirewall, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::Router;
    use crate::profile::{Phase, Profile, ProfileContext};
    use crate::secrets::StaticSecrets;
    use crate::testutil::{compiled, LAB};

    #[test]
    fn router_installs_its_parts_in_order() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("router").expect("id"),
            secrets: &secrets,
        };
        let install = Router::new().units(&ctx, Phase::Install).expect("units");
        let labels: Vec<&str> = install.iter().map(|u| u.label()).collect();
        assert_eq!(
            labels,
            vec!["pkg_isc_dhcp_server", "pkg_unbound", "pkg_iptables", "pkg_iptables_persistent"]
        );
        let live = Router::new().units(&ctx, Phase::LiveConfig).expect("units");
        assert_eq!(live[0].label(), "sysctl_net_ipv4_ip_forward");
    }
}
