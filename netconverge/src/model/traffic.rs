use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use crate::error::DataError;

/// Transport protocol a rule matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encapsulation {
    Tcp,
    Udp,
}

impl Encapsulation {
    pub fn as_str(self) -> &'static str {
        match self {
            Encapsulation::Tcp => "tcp",
            Encapsulation::Udp => "udp",
        }
    }
}

impl Display for Encapsulation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction or table a rule lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Table {
    Dnat,
    Forward,
    Ingress,
    Egress,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Dnat => "dnat",
            Table::Forward => "forward",
            Table::Ingress => "ingress",
            Table::Egress => "egress",
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination meaning "anywhere".
pub const ANY: &str = "*";

/// A validated port set. Empty means every port.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PortSet(BTreeSet<u16>);

impl PortSet {
    pub fn any() -> Self {
        Self(BTreeSet::new())
    }

    /// Validate raw values; anything outside 1-65535 is a data error.
    pub fn new(label: &str, field: &str, values: &[i64]) -> Result<Self, DataError> {
        let mut out = BTreeSet::new();
        for &value in values {
            let port = u16::try_from(value)
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| DataError::InvalidPort {
                    label: label.to_string(),
                    field: field.to_string(),
                    value,
                })?;
            out.insert(port);
        }
        Ok(Self(out))
    }

    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.0.iter().copied()
    }

    /// Comma-joined list, as taken by `--dports`.
    pub fn joined(&self) -> String {
        self.0
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// One piece of traffic intent: `source` may talk to `destinations` on
/// `ports` over `encapsulation`, in `table`.
///
/// Destinations stay as labels or host strings until the firewall pass
/// resolves them against the allocated topology.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TrafficRule {
    pub encapsulation: Encapsulation,
    pub table: Table,
    pub source: String,
    pub destinations: BTreeSet<String>,
    pub ports: PortSet,
}

impl TrafficRule {
    pub fn new<I, S>(
        encapsulation: Encapsulation,
        table: Table,
        source: impl Into<String>,
        destinations: I,
        ports: &[i64],
    ) -> Result<Self, DataError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let source = source.into();
        let ports = PortSet::new(&source, table.as_str(), ports)?;
        Ok(Self {
            encapsulation,
            table,
            destinations: destinations.into_iter().map(Into::into).collect(),
            source,
            ports,
        })
    }

    pub fn with_ports(mut self, ports: PortSet) -> Self {
        self.ports = ports;
        self
    }
}

/// Split a firewall target of the form `name` or `name:port`.
///
/// Bare IPv6 is not supported, so the last `:` always separates a port.
pub fn split_target(label: &str, field: &str, raw: &str) -> Result<(String, Option<u16>), DataError> {
    let raw = raw.trim();
    let Some((name, port)) = raw.rsplit_once(':') else {
        return Ok((raw.to_string(), None));
    };
    let value: i64 = port.parse().map_err(|_| DataError::InvalidValue {
        label: label.to_string(),
        field: field.to_string(),
        value: raw.to_string(),
        expected: "name or name:port".to_string(),
    })?;
    let ports = PortSet::new(label, field, &[value])?;
    let first = ports.iter().next();
    Ok((name.to_string(), first))
}

#[cfg(test)]
mod tests {
    use super::{split_target, Encapsulation, PortSet, Table, TrafficRule};
    use crate::error::DataError;

    #[test]
    fn port_bounds_are_inclusive() {
        let ports = PortSet::new("web", "listen", &[1, 65535]).expect("edges are valid");
        assert_eq!(ports.joined(), "1,65535");
        for bad in [0, 65536, -1] {
            let err = TrafficRule::new(Encapsulation::Tcp, Table::Egress, "web", ["*"], &[bad])
                .expect_err("out of range");
            assert!(matches!(err, DataError::InvalidPort { value, .. } if value == bad));
        }
    }

    #[test]
    fn split_target_reads_optional_port() {
        assert_eq!(
            split_target("web", "egress", "example.org:443").expect("split"),
            ("example.org".to_string(), Some(443))
        );
        assert_eq!(
            split_target("web", "egress", "mailsrv").expect("split"),
            ("mailsrv".to_string(), None)
        );
        assert!(split_target("web", "egress", "mailsrv:0").is_err());
        assert!(split_target("web", "egress", "mailsrv:http").is_err());
    }
}
