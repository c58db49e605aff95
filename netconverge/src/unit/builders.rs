//! Constructors for the units profiles use most.
//!
//! Every builder returns a plain [`Unit`]; labels are derived from the
//! arguments so two profiles asking for the same fact collide loudly at
//! compile time instead of shadowing each other.

use script_doc::shell_quote;

use crate::unit::{ident, Unit};

/// Here-document delimiter for file bodies.
pub const HEREDOC: &str = "NETCONVERGE_EOF";

/// Label fragment for a path or name: runs of `_` collapsed, ends trimmed.
pub fn key(raw: &str) -> String {
    let mut out = String::new();
    for c in ident(raw).chars() {
        if c == '_' && (out.is_empty() || out.ends_with('_')) {
            continue;
        }
        out.push(c);
    }
    out.trim_end_matches('_').to_string()
}

pub fn package_installed(package: &str) -> Unit {
    let q = shell_quote(package);
    Unit::new(
        format!("pkg_{}", key(package)),
        format!("dpkg-query -W -f='${{Status}}' {q} 2>/dev/null"),
        "install ok installed",
        format!("DEBIAN_FRONTEND=noninteractive apt-get install -y {q}"),
    )
    .message(format!("package {package} is not installed"))
}

pub fn service_running(service: &str) -> Unit {
    let q = shell_quote(service);
    Unit::new(
        format!("svc_{}_running", key(service)),
        format!("systemctl is-active {q}"),
        "active",
        format!("systemctl restart {q}"),
    )
    .message(format!("service {service} is not running"))
}

pub fn service_enabled(service: &str) -> Unit {
    let q = shell_quote(service);
    Unit::new(
        format!("svc_{}_enabled", key(service)),
        format!("systemctl is-enabled {q}"),
        "enabled",
        format!("systemctl enable {q}"),
    )
    .message(format!("service {service} is not enabled"))
}

/// File `path` holds exactly `body`. A missing trailing newline is added.
pub fn file_content(path: &str, body: &str) -> Unit {
    let mut body = body.to_string();
    if !body.ends_with('\n') {
        body.push('\n');
    }
    let q = shell_quote(path);
    let dir = parent_dir(path);
    let config = format!(
        "mkdir -p {} && cat > {q} <<'{HEREDOC}'\n{body}{HEREDOC}",
        shell_quote(dir)
    );
    Unit::new(
        format!("file_{}", key(path)),
        format!("cksum < {q} 2>/dev/null"),
        cksum(body.as_bytes()),
        config,
    )
    .message(format!("{path} differs from its rendered content"))
}

pub fn line_appended(label: &str, path: &str, line: &str) -> Unit {
    let q = shell_quote(path);
    let l = shell_quote(line);
    Unit::new(
        label,
        format!("grep -qxF {l} {q} 2>/dev/null && echo present"),
        "present",
        format!("printf '%s\\n' {l} >> {q}"),
    )
    .message(format!("{path} lacks a required line"))
}

pub fn dir_exists(path: &str) -> Unit {
    let q = shell_quote(path);
    Unit::new(
        format!("dir_{}", key(path)),
        format!("test -d {q} && echo yes"),
        "yes",
        format!("mkdir -p {q}"),
    )
    .message(format!("directory {path} is missing"))
}

pub fn user_exists(user: &str, fullname: &str) -> Unit {
    let q = shell_quote(user);
    Unit::new(
        format!("user_{}", key(user)),
        format!("id -u {q} >/dev/null 2>&1 && echo yes"),
        "yes",
        format!("useradd -m -s /bin/bash -c {} {q}", shell_quote(fullname)),
    )
    .message(format!("user {user} does not exist"))
}

pub fn group_member(user: &str, group: &str) -> Unit {
    let u = shell_quote(user);
    let g = shell_quote(group);
    Unit::new(
        format!("group_{}_{}", key(group), key(user)),
        format!("id -nG {u} 2>/dev/null | tr ' ' '\\n' | grep -qx {g} && echo yes"),
        "yes",
        format!("usermod -aG {g} {u}"),
    )
    .message(format!("{user} is not in group {group}"))
}

pub fn file_mode(path: &str, mode: &str) -> Unit {
    let q = shell_quote(path);
    Unit::new(
        format!("mode_{}", key(path)),
        format!("stat -c %a {q} 2>/dev/null"),
        mode,
        format!("chmod {mode} {q}"),
    )
    .message(format!("{path} should have mode {mode}"))
}

/// `owner` is `user:group`.
pub fn file_owner(path: &str, owner: &str) -> Unit {
    let q = shell_quote(path);
    Unit::new(
        format!("owner_{}", key(path)),
        format!("stat -c %U:%G {q} 2>/dev/null"),
        owner,
        format!("chown {} {q}", shell_quote(owner)),
    )
    .message(format!("{path} should be owned by {owner}"))
}

pub fn symlink(link: &str, target: &str) -> Unit {
    let l = shell_quote(link);
    let t = shell_quote(target);
    Unit::new(
        format!("link_{}", key(link)),
        format!("readlink {l}"),
        target,
        format!("ln -sfn {t} {l}"),
    )
    .message(format!("{link} should point at {target}"))
}

pub fn sysctl(name: &str, value: &str) -> Unit {
    Unit::new(
        format!("sysctl_{}", key(name)),
        format!("sysctl -n {}", shell_quote(name)),
        value,
        format!("sysctl -w {}", shell_quote(&format!("{name}={value}"))),
    )
    .message(format!("{name} should be {value}"))
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Output of POSIX `cksum` reading `data` from standard input.
pub fn cksum(data: &[u8]) -> String {
    const POLY: u32 = 0x04c1_1db7;
    fn feed(crc: u32, byte: u8) -> u32 {
        let mut crc = crc ^ (u32::from(byte) << 24);
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
        }
        crc
    }

    let mut crc = data.iter().fold(0u32, |crc, byte| feed(crc, *byte));
    let mut len = data.len();
    while len > 0 {
        crc = feed(crc, (len & 0xff) as u8);
        len >>= 8;
    }
    format!("{} {}", !crc, data.len())
}
