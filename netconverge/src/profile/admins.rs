use script_doc::shell_quote;

use crate::error::Error;
use crate::profile::{Profile, ProfileContext, ProfileRegistration};
use crate::unit::builders::{
    dir_exists, file_content, file_mode, file_owner, group_member, key, user_exists,
};
use crate::unit::Unit;

/// Local accounts for the people listed as a machine's admins.
pub struct Admins;

fn build() -> Box<dyn Profile> {
    Box::new(Admins)
}

inventory::submit! {
    ProfileRegistration { name: "admins", build }
}

impl Profile for Admins {
    fn name(&self) -> &'static str {
        "admins"
    }

    fn persistent_config(&self, ctx: &ProfileContext<'_>) -> Result<Vec<Unit>, Error> {
        let graph = &ctx.net.graph;
        let mut units = Vec::new();
        for admin in &ctx.machine().admins {
            let Some(account) = graph.get(admin).and_then(|m| m.account.as_ref()) else {
                continue;
            };
            let user = user_exists(admin, &account.fullname).after("pkg_sudo");
            let user_label = user.label().to_string();
            units.push(user);
            units.push(group_member(admin, "sudo").after(&user_label));

            if let Some(sshkey) = &account.sshkey {
                let ssh_dir = format!("/home/{admin}/.ssh");
                let keys = format!("{ssh_dir}/authorized_keys");
                let dir = dir_exists(&ssh_dir).after(&user_label);
                let dir_label = dir.label().to_string();
                let file = file_content(&keys, sshkey).after(&dir_label);
                let file_label = file.label().to_string();
                units.push(dir);
                units.push(file);
                units.push(file_owner(&ssh_dir, &format!("{admin}:{admin}")).after(&dir_label));
                units.push(file_owner(&keys, &format!("{admin}:{admin}")).after(&file_label));
                units.push(file_mode(&keys, "600").after(&file_label));
            }

            if graph.autogenpasswds {
                let passphrase = ctx.secrets.get(ctx.label());
                let q = shell_quote(admin);
                units.push(
                    Unit::new(
                        format!("passwd_{}", key(admin)),
                        format!("passwd -S {q} 2>/dev/null | cut -d' ' -f2"),
                        "P",
                        format!(
                            "printf '%s\\n' {} | chpasswd",
                            shell_quote(&format!("{admin}:{passphrase}"))
                        ),
                    )
                    .after(&user_label)
                    .message(format!("{admin} has no usable password")),
                );
            }
        }
        Ok(units)
    }
}

#[cfg(test)]
mod tests {
    use super::Admins;
    use crate::profile::{Profile, ProfileContext};
    use crate::secrets::StaticSecrets;
    use crate::testutil::{compiled, LAB};

    #[test]
    fn admin_gets_account_key_and_password() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::new("s3cret");
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("hv").expect("id"),
            secrets: &secrets,
        };
        let units = Admins.persistent_config(&ctx).expect("units");
        let labels: Vec<&str> = units.iter().map(|u| u.label()).collect();
        assert_eq!(
            labels,
            vec![
                "user_alice",
                "group_sudo_alice",
                "dir_home_alice_ssh",
                "file_home_alice_ssh_authorized_keys",
                "owner_home_alice_ssh",
                "owner_home_alice_ssh_authorized_keys",
                "mode_home_alice_ssh_authorized_keys",
                "passwd_alice",
            ]
        );
        let passwd = units.last().expect("passwd");
        assert!(passwd.config().expect("config").contains("'alice:s3cret'"));
    }

    #[test]
    fn machine_without_admins_gets_nothing() {
        let net = compiled(LAB);
        let secrets = StaticSecrets::default();
        let ctx = ProfileContext {
            net: &net,
            id: net.graph.id("websrv").expect("id"),
            secrets: &secrets,
        };
        assert!(Admins.persistent_config(&ctx).expect("units").is_empty());
    }
}
