//! The Unit convergence primitive.
//!
//! A [`Unit`] is one testable fact about a machine: an audit command whose
//! output is compared with an expected value, and optionally a command that
//! makes the fact true. Units are built by profiles, then rendered by the
//! script compiler or driven in process by [`Executor`].

pub mod builders;
mod state;

use serde::Serialize;

pub use state::{Executor, Host, Report, UnitOutcome, UnitState};

/// Precondition that always holds.
pub const PROCEED: &str = "proceed";

/// How audit output is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    PassOnEqual,
    PassOnNotEqual,
}

impl Polarity {
    pub fn passes(self, output: &str, expected: &str) -> bool {
        match self {
            Polarity::PassOnEqual => output == expected,
            Polarity::PassOnNotEqual => output != expected,
        }
    }
}

/// One named configuration fact. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Unit {
    label: String,
    precondition: String,
    audit: String,
    config: Option<String>,
    expected: String,
    polarity: Polarity,
    message: String,
}

impl Unit {
    /// A unit the scripts can fix: `config` runs when `audit` fails.
    pub fn new(
        label: impl Into<String>,
        audit: impl Into<String>,
        expected: impl Into<String>,
        config: impl Into<String>,
    ) -> Self {
        Self::build(label.into(), audit.into(), expected.into(), Some(config.into()))
    }

    /// A fact the scripts can only observe.
    pub fn singleton(
        label: impl Into<String>,
        audit: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::build(label.into(), audit.into(), expected.into(), None)
    }

    fn build(label: String, audit: String, expected: String, config: Option<String>) -> Self {
        let message = format!("{label} not satisfied");
        Self {
            label,
            precondition: PROCEED.to_string(),
            audit,
            config,
            expected,
            polarity: Polarity::PassOnEqual,
            message,
        }
    }

    pub fn after(mut self, precondition: impl Into<String>) -> Self {
        self.precondition = precondition.into();
        self
    }

    pub fn polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn precondition(&self) -> &str {
        &self.precondition
    }

    pub fn audit(&self) -> &str {
        &self.audit
    }

    pub fn config(&self) -> Option<&str> {
        self.config.as_deref()
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    pub fn polarity_kind(&self) -> Polarity {
        self.polarity
    }

    pub fn failure_message(&self) -> &str {
        &self.message
    }

    pub fn is_singleton(&self) -> bool {
        self.config.is_none()
    }
}

/// Unit labels become shell variable names.
pub fn is_shell_identifier(label: &str) -> bool {
    let mut chars = label.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Fold an arbitrary name into a shell identifier fragment.
pub fn ident(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) || out.is_empty() {
        out.insert(0, '_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{ident, is_shell_identifier, Polarity, Unit, PROCEED};

    #[test]
    fn defaults_and_builders() {
        let unit = Unit::new("nginx_installed", "dpkg-query -W -f '${Status}' nginx", "install ok installed", "apt-get install -y nginx");
        assert_eq!(unit.precondition(), PROCEED);
        assert!(!unit.is_singleton());
        let gated = Unit::singleton("disk_present", "test -e /dev/vda && echo yes", "yes").after("nginx_installed");
        assert!(gated.is_singleton());
        assert_eq!(gated.precondition(), "nginx_installed");
    }

    #[test]
    fn polarity_decides_pass() {
        assert!(Polarity::PassOnEqual.passes("yes", "yes"));
        assert!(!Polarity::PassOnEqual.passes("no", "yes"));
        assert!(Polarity::PassOnNotEqual.passes("", "0"));
    }

    #[test]
    fn identifiers() {
        assert!(is_shell_identifier("web_installed"));
        assert!(is_shell_identifier("_x1"));
        assert!(!is_shell_identifier("1web"));
        assert!(!is_shell_identifier("web-installed"));
        assert!(!is_shell_identifier(""));
        assert_eq!(ident("isc-dhcp-server"), "isc_dhcp_server");
        assert_eq!(ident("9p"), "_9p");
    }
}
