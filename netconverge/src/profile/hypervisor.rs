//! KVM host for the services that name this machine as their hypervisor.

use script_doc::shell_quote;

use crate::error::Error;
use crate::model::{DiskMedium, MachineModel};
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{dir_exists, file_content, key, package_installed, service_running};
use crate::unit::Unit;

const PACKAGES: [&str; 3] = ["qemu-system-x86", "libvirt-daemon-system", "virtinst"];
const IMAGE_DIR: &str = "/var/lib/libvirt/images";

pub struct Hypervisor;

fn build() -> Box<dyn Profile> {
    Box::new(Hypervisor)
}

inventory::submit! {
    ProfileRegistration { name: "hypervisor", build }
}

fn backup_cron(service: &MachineModel, hours: u32) -> String {
    let domain = &service.label;
    format!(
        "# netconverge: snapshot {domain} every {hours} hours\n\
         0 */{hours} * * * root virsh snapshot-create-as {domain} --disk-only --atomic --no-metadata >/dev/null\n"
    )
}

impl Profile for Hypervisor {
    fn name(&self) -> &'static str {
        "hypervisor"
    }

    fn install(&self, _ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        Ok(PACKAGES.iter().map(|p| package_installed(p)).collect())
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let images = dir_exists(IMAGE_DIR).after("pkg_libvirt_daemon_system");
        let images_label = images.label().to_string();
        let mut units = vec![images];

        for service in ctx.net.graph.services_on(ctx.label()) {
            let Some(spec) = &service.service else {
                continue;
            };
            for disk in spec.disks.iter().filter(|d| d.medium == DiskMedium::Disk) {
                let path = format!("{IMAGE_DIR}/{}", disk.filename);
                let q = shell_quote(&path);
                units.push(
                    Unit::singleton(
                        format!("disk_{}_{}", key(&service.label), key(&disk.name)),
                        format!("test -f {q} && echo present"),
                        "present",
                    )
                    .after(&images_label)
                    .message(format!(
                        "{} disk image {path} ({} MB {}) is missing",
                        service.label, disk.size_mb, disk.format
                    )),
                );
            }
            if let Some(hours) = spec.backup_hours {
                let path = format!("/etc/cron.d/netconverge-backup-{}", service.label);
                units.push(file_content(&path, &backup_cron(service, hours)));
            }
        }
        Ok(units)
    }

    fn live_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let libvirtd = service_running("libvirtd").after("pkg_libvirt_daemon_system");
        let libvirtd_label = libvirtd.label().to_string();
        let mut units = vec![libvirtd];
        for service in ctx.net.graph.services_on(ctx.label()) {
            let q = shell_quote(&service.label);
            units.push(
                Unit::singleton(
                    format!("vm_{}_running", key(&service.label)),
                    format!("virsh domstate {q}"),
                    "running",
                )
                .after(&libvirtd_label)
                .message(format!("virtual machine {} is not running", service.label)),
            );
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::Hypervisor;
    use crate::profile::{Profile, ProfileContext};
    use crate::secrets::StaticSecrets;
    use crate::testutil::{compiled, LAB};

    #[test]
    fn disks_backups_and_vms_for_hosted_services() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("hv").expect("id"),
            secrets: &secrets,
        };
        let persistent = Hypervisor.persistent_config(&ctx).expect("units");
        let labels: Vec<&str> = persistent.iter().map(|u| u.label()).collect();
        assert_eq!(
            labels,
            vec![
                "dir_var_lib_libvirt_images",
                "disk_websrv_boot",
                "file_etc_cron_d_netconverge_backup_websrv",
            ]
        );
        assert!(persistent[1].is_singleton());
        assert!(persistent[1].audit().contains("/var/lib/libvirt/images/websrv_boot.qcow2"));
        let cron = persistent[2].config().expect("config");
        assert!(cron.contains("0 */6 * * * root virsh snapshot-create-as websrv"));

        let live = Hypervisor.live_config(&ctx).expect("units");
        assert_eq!(live[1].label(), "vm_websrv_running");
        assert_eq!(live[1].expected(), "running");
    }
}
