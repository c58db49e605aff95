//! Unit-by-unit diffing of two rendered scripts.
//!
//! Sections are paired by name, so a unit that moved in the script keeps its
//! identity and only real edits are reported. Paths read `script.<name>`,
//! nested sections append `.<name>`, and a name that occurs more than once
//! gets a 1-based `[n]`. Lines outside any section belong to the enclosing
//! path (`script` for the document itself).

mod engine;
mod result;

pub use result::{DiffEntry, DiffSummary, MarkerChange};

use crate::tree::ScriptNode;

/// What to report and what to skip.
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    /// Emit [`DiffEntry::Unchanged`] for sections with no differences.
    pub include_identical: bool,
    /// Section names skipped wherever they appear, with everything inside.
    pub ignore_sections: Vec<String>,
}

pub fn diff(left: &ScriptNode, right: &ScriptNode) -> Vec<DiffEntry> {
    diff_with_options(left, right, &DiffOptions::default())
}

/// Entries come out in the order the sections first appear, left side first.
pub fn diff_with_options(left: &ScriptNode, right: &ScriptNode, opts: &DiffOptions) -> Vec<DiffEntry> {
    let mut out = Vec::new();
    engine::compare(left, right, "script", opts, &mut out);
    out
}
