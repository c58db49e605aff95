use crate::error::Error;
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{file_content, package_installed, service_enabled};
use crate::unit::Unit;

const PACKAGE: &str = "unattended-upgrades";
const PERIODIC: &str = "/etc/apt/apt.conf.d/20auto-upgrades";

/// Daily security updates through `unattended-upgrades`.
pub struct UnattendedUpgrades;

fn build() -> Box<dyn Profile> {
    Box::new(UnattendedUpgrades)
}

inventory::submit! {
    ProfileRegistration { name: "unattended-upgrades", build }
}

impl Profile for UnattendedUpgrades {
    fn name(&self) -> &'static str {
        "unattended-upgrades"
    }

    fn install(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(vec![package_installed(PACKAGE)])
    }

    fn persistent_config(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let body = "APT::Periodic::Update-Package-Lists \"1\";\nAPT::Periodic::Unattended-Upgrade \"1\";\n";
        Ok(vec![file_content(PERIODIC, body).after(package_installed(PACKAGE).label())])
    }

    fn live_config(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(vec![service_enabled(PACKAGE).after(package_installed(PACKAGE).label())])
    }
}
