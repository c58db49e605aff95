use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::Serialize;
use sha2::{Digest, Sha256};

/// A 48-bit Ethernet address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Derive a stable address for `label` under a three-octet prefix.
    ///
    /// `attempt` perturbs the digest so callers can step past a collision
    /// and still get the same answer on every run.
    pub fn derived(prefix: [u8; 3], label: &str, attempt: u32) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(label.as_bytes());
        hasher.update(attempt.to_le_bytes());
        let tail = hasher.finalize();
        Self([prefix[0], prefix[1], prefix[2], tail[0], tail[1], tail[2]])
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl Display for MacAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddress {
    type Err = ();

    /// Accepts `:` or `-` separated hex octets, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(());
        }
        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(&parts) {
            *slot = octet(part).ok_or(())?;
        }
        Ok(Self(octets))
    }
}

/// Parse a `xx:xx:xx` prefix used for generated addresses.
pub fn parse_prefix(raw: &str) -> Option<[u8; 3]> {
    let parts: Vec<&str> = raw.trim().split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let mut out = [0u8; 3];
    for (slot, part) in out.iter_mut().zip(&parts) {
        *slot = octet(part)?;
    }
    Some(out)
}

/// Exactly two hex digits, no sign.
fn octet(part: &str) -> Option<u8> {
    if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(part, 16).ok()
}
