use std::collections::BTreeMap;

use serde::Serialize;

use crate::compiler::Mode;
use crate::unit::{Unit, PROCEED};

/// Where one unit stands during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitState {
    Untested,
    Passed,
    Failed,
    /// Audit failed and the config command is being applied.
    Configuring,
}

impl UnitState {
    fn audited(passed: bool) -> Self {
        if passed {
            UnitState::Passed
        } else {
            UnitState::Failed
        }
    }

    /// Legal transitions: out of `Untested` into anything, out of
    /// `Configuring` into a final state.
    pub fn can_move_to(self, next: UnitState) -> bool {
        matches!(
            (self, next),
            (UnitState::Untested, UnitState::Passed | UnitState::Failed | UnitState::Configuring)
                | (UnitState::Configuring, UnitState::Passed | UnitState::Failed)
        )
    }
}

/// The machine a script runs on.
pub trait Host {
    /// Run an audit command, returning its trimmed standard output.
    fn audit(&mut self, command: &str) -> String;

    /// Run a config command.
    fn configure(&mut self, command: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitOutcome {
    pub label: String,
    pub state: UnitState,
    pub configured: bool,
    /// Config command a dry run would have executed.
    pub pending: Option<String>,
}

/// Counters a script prints in its footer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
    pub pass: usize,
    pub fail: usize,
    pub failed: Vec<String>,
    pub outcomes: Vec<UnitOutcome>,
}

impl Report {
    /// Same text as a rendered script's last line.
    pub fn summary_line(&self) -> String {
        let failed: String = self.failed.iter().map(|label| format!(" {label}")).collect();
        format!("pass={} fail={} failed:{failed}", self.pass, self.fail)
    }
}

/// Drives units through their state machine exactly as a rendered script
/// would, against any [`Host`].
pub struct Executor {
    mode: Mode,
    results: BTreeMap<String, bool>,
}

impl Executor {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            results: BTreeMap::new(),
        }
    }

    pub fn run<H: Host>(mut self, units: &[Unit], host: &mut H) -> Report {
        let mut report = Report::default();
        for unit in units {
            let outcome = self.step(unit, host);
            let passed = outcome.state == UnitState::Passed;
            self.results.insert(unit.label().to_string(), passed);
            if passed {
                report.pass += 1;
            } else {
                report.fail += 1;
                report.failed.push(unit.label().to_string());
            }
            report.outcomes.push(outcome);
        }
        report
    }

    fn precondition_holds(&self, unit: &Unit) -> bool {
        unit.precondition() == PROCEED
            || self.results.get(unit.precondition()).copied().unwrap_or(false)
    }

    fn check(unit: &Unit, host: &mut impl Host) -> bool {
        let output = host.audit(unit.audit());
        unit.polarity_kind().passes(&output, unit.expected())
    }

    fn step(&self, unit: &Unit, host: &mut impl Host) -> UnitOutcome {
        let mut outcome = UnitOutcome {
            label: unit.label().to_string(),
            state: UnitState::Untested,
            configured: false,
            pending: None,
        };

        match self.mode {
            Mode::Audit => {
                outcome.state = UnitState::audited(Self::check(unit, host));
            }
            Mode::Dryrun => {
                let passed = Self::check(unit, host);
                outcome.state = UnitState::audited(passed);
                if !passed {
                    outcome.pending = unit.config().map(str::to_string);
                }
            }
            Mode::Config => {
                if !self.precondition_holds(unit) {
                    outcome.state = UnitState::Failed;
                    return outcome;
                }
                if Self::check(unit, host) {
                    outcome.state = UnitState::Passed;
                    return outcome;
                }
                let Some(config) = unit.config() else {
                    outcome.state = UnitState::Failed;
                    return outcome;
                };
                outcome.state = UnitState::Configuring;
                host.configure(config);
                outcome.configured = true;
                outcome.state = UnitState::audited(Self::check(unit, host));
            }
        }
        outcome
    }
}
