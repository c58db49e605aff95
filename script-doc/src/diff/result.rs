use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// How one section of a script differs between two renderings.
///
/// Lines are carried as rendered text without surrounding whitespace.
/// `marker` is the section's attribute list as written after its name
/// (`after=pkg_nginx singleton=yes`), empty when it has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum DiffEntry {
    Unchanged { path: String },
    /// Present on both sides with a different marker or body.
    Changed {
        path: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        marker: Option<MarkerChange>,
        removed: Vec<String>,
        added: Vec<String>,
    },
    Removed {
        path: String,
        marker: String,
        body: Vec<String>,
    },
    Added {
        path: String,
        marker: String,
        body: Vec<String>,
    },
    /// The two sides cannot be paired section for section.
    Structural { path: String, description: String },
}

/// Section attributes before and after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerChange {
    pub before: String,
    pub after: String,
}

impl DiffEntry {
    pub fn path(&self) -> &str {
        match self {
            DiffEntry::Unchanged { path }
            | DiffEntry::Changed { path, .. }
            | DiffEntry::Removed { path, .. }
            | DiffEntry::Added { path, .. }
            | DiffEntry::Structural { path, .. } => path,
        }
    }

    /// Section name: the last path segment without its `[n]` index.
    pub fn section(&self) -> &str {
        let last = self.path().rsplit('.').next().unwrap_or_default();
        last.split_once('[').map_or(last, |(name, _)| name)
    }
}

/// Counts over a diff, in sections and in lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub changed: usize,
    pub removed: usize,
    pub added: usize,
    pub structural: usize,
    pub lines_removed: usize,
    pub lines_added: usize,
}

impl DiffSummary {
    pub fn of(entries: &[DiffEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry {
                DiffEntry::Unchanged { .. } => summary.unchanged += 1,
                DiffEntry::Changed { removed, added, .. } => {
                    summary.changed += 1;
                    summary.lines_removed += removed.len();
                    summary.lines_added += added.len();
                }
                DiffEntry::Removed { body, .. } => {
                    summary.removed += 1;
                    summary.lines_removed += body.len();
                }
                DiffEntry::Added { body, .. } => {
                    summary.added += 1;
                    summary.lines_added += body.len();
                }
                DiffEntry::Structural { .. } => summary.structural += 1,
            }
        }
        summary
    }

    pub fn is_clean(&self) -> bool {
        self.changed + self.removed + self.added + self.structural == 0
    }
}

impl Display for DiffSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unchanged={} changed={} removed={} added={} structural={} lines=+{}/-{}",
            self.unchanged,
            self.changed,
            self.removed,
            self.added,
            self.structural,
            self.lines_added,
            self.lines_removed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::{DiffEntry, DiffSummary};

    #[test]
    fn summary_counts_sections_and_lines() {
        let entries = vec![
            DiffEntry::Changed {
                path: "script.pkg_nginx".to_string(),
                marker: None,
                removed: vec!["a".to_string()],
                added: vec!["b".to_string(), "c".to_string()],
            },
            DiffEntry::Added {
                path: "script.svc_nginx[2]".to_string(),
                marker: "after=pkg_nginx".to_string(),
                body: vec!["x".to_string()],
            },
        ];
        let summary = DiffSummary::of(&entries);
        assert_eq!(
            summary.to_string(),
            "unchanged=0 changed=1 removed=0 added=1 structural=0 lines=+3/-1"
        );
        assert!(!summary.is_clean());
        assert_eq!(entries[1].section(), "svc_nginx");
        assert!(DiffSummary::of(&[]).is_clean());
    }
}
