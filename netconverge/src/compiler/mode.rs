use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which script a unit list is rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Check every unit, change nothing.
    Audit,
    /// Check, fix what failed, check again.
    Config,
    /// Check and print what `config` would run.
    Dryrun,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Audit, Mode::Config, Mode::Dryrun];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Audit => "audit",
            Mode::Config => "config",
            Mode::Dryrun => "dryrun",
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Mode::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| format!("unknown mode '{s}', expected audit, config or dryrun"))
    }
}
