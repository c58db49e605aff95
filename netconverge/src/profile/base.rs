use script_doc::shell_quote;

use crate::error::Error;
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{file_content, package_installed, service_running};
use crate::unit::Unit;

const PACKAGES: [&str; 3] = ["sudo", "openssh-server", "ca-certificates"];

/// Hostname, `/etc/hosts` and the packages every managed host needs.
pub struct Base;

fn build() -> Box<dyn Profile> {
    Box::new(Base)
}

inventory::submit! {
    ProfileRegistration { name: "base", build }
}

impl Base {
    fn hosts_file(ctx: &ProfileContext<'_>) -> String {
        let machine = ctx.machine();
        let mut out = format!("127.0.0.1\tlocalhost\n127.0.1.1\t{}\t{}\n", machine.fqdn, machine.label);
        for addr in ctx.net.topology.addresses_of(ctx.id) {
            out.push_str(&format!("{addr}\t{}\t{}\n", machine.fqdn, machine.label));
        }
        out
    }
}

impl Profile for Base {
    fn name(&self) -> &'static str {
        "base"
    }

    fn install(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(PACKAGES.iter().map(|p| package_installed(p)).collect())
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(vec![
            file_content("/etc/hostname", ctx.label()),
            file_content("/etc/hosts", &Self::hosts_file(ctx)),
        ])
    }

    fn live_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let label = ctx.label();
        Ok(vec![
            Unit::new(
                "hostname_live",
                "hostname",
                label,
                format!("hostname {}", shell_quote(label)),
            )
            .after("file_etc_hostname")
            .message(format!("running hostname is not {label}")),
            service_running("ssh").after("pkg_openssh_server"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::Base;
    use crate::model::MachineId;
    use crate::profile::{Profile, ProfileContext};
    use crate::secrets::StaticSecrets;
    use crate::testutil::{compiled, LAB};

    #[test]
    fn hosts_file_lists_allocated_address() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let id: MachineId = net.graph.id("websrv").expect("id");
        let ctx = ProfileContext {
            net: &net,
            id,
            secrets: &secrets,
        };
        assert!(Base::hosts_file(&ctx).contains("10.10.0.3\twebsrv.lan\twebsrv\n"));
        let live = Base.live_config(&ctx).expect("units");
        assert_eq!(live[0].precondition(), "file_etc_hostname");
        assert_eq!(live[0].expected(), "websrv");
    }
}
