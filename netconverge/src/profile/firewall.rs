//! Firewall rules on disk and in the kernel.

use crate::error::Error;
use crate::firewall::FirewallDocument;
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{file_content, key, package_installed, service_enabled};
use crate::unit::Unit;

/// Which ruleset a machine loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Host,
    Router,
}

/// Host rules on ordinary machines, the full chain set on the router.
pub struct Firewall {
    scope: Scope,
}

impl Firewall {
    pub fn host() -> Self {
        Self { scope: Scope::Host }
    }

    pub fn router() -> Self {
        Self {
            scope: Scope::Router,
        }
    }

    fn document(&self, ctx: &ProfileContext<'_>) -> Result<FirewallDocument, Error> {
        let backend = ctx.net.backend();
        let doc = match self.scope {
            Scope::Host => backend.render_host(&ctx.net.graph, &ctx.net.firewall, ctx.id)?,
            Scope::Router => backend.render_router(&ctx.net.graph, &ctx.net.firewall)?,
        };
        Ok(doc)
    }
}

fn build_host() -> Box<dyn Profile> {
    Box::new(Firewall::host())
}

fn build_router() -> Box<dyn Profile> {
    Box::new(Firewall::router())
}

inventory::submit! {
    ProfileRegistration { name: "host-firewall", build: build_host }
}

inventory::submit! {
    ProfileRegistration { name: "router-firewall", build: build_router }
}

impl Profile for Firewall {
    fn name(&self) -> &'static str {
        match self.scope {
            Scope::Host => "host-firewall",
            Scope::Router => "router-firewall",
        }
    }

    fn install(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(ctx
            .net
            .backend()
            .packages()
            .iter()
            .map(|p| package_installed(p))
            .collect())
    }

    fn persistent_firewall(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let backend = ctx.net.backend();
        let doc = self.document(ctx)?;
        let first_package = backend
            .packages()
            .first()
            .map(|p| package_installed(p).label().to_string());
        let mut file = file_content(&doc.path, &doc.content);
        if let Some(package) = &first_package {
            file = file.after(package);
        }
        let enabled = service_enabled(backend.service()).after(file.label());
        Ok(vec![file, enabled])
    }

    fn live_firewall(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let backend = ctx.net.backend();
        let doc = self.document(ctx)?;
        let check = backend.live_check(&doc.revision);
        let file_label = format!("file_{}", key(&doc.path));
        Ok(vec![Unit::new(
            "firewall_live",
            check.command,
            check.expected,
            backend.reload_command(),
        )
        .after(file_label)
        .message(format!("live {} rules are not revision {}", backend.name(), doc.revision))])
    }
}

#[cfg(test)]
mod tests {
    use super::Firewall;
    use crate::profile::{Profile, ProfileContext};
    use crate::secrets::StaticSecrets;
    use crate::settings::{FirewallBackendKind, Settings};
    use crate::testutil::{compiled, compiled_with, LAB};

    #[test]
    fn live_check_is_gated_on_the_rules_file() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("router").expect("id"),
            secrets: &secrets,
        };
        let persistent = Firewall::router().persistent_firewall(&ctx).expect("units");
        assert_eq!(persistent[0].label(), "file_etc_iptables_rules_v4");
        assert_eq!(persistent[0].precondition(), "pkg_iptables");
        assert_eq!(persistent[1].label(), "svc_netfilter_persistent_enabled");

        let live = Firewall::router().live_firewall(&ctx).expect("units");
        assert_eq!(live[0].precondition(), "file_etc_iptables_rules_v4");
        assert_eq!(live[0].expected(), "1");
    }

    #[test]
    fn firewalld_backend_writes_a_zone() {
        let mut settings = Settings::default();
        settings.firewall.backend = FirewallBackendKind::Firewalld;
        let net = compiled_with(LAB, settings);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("websrv").expect("id"),
            secrets: &secrets,
        };
        let persistent = Firewall::host().persistent_firewall(&ctx).expect("units");
        assert_eq!(persistent[0].label(), "file_etc_firewalld_zones_netconverge_xml");
        let install = Firewall::host().install(&ctx).expect("units");
        assert_eq!(install[0].label(), "pkg_firewalld");
    }
}
