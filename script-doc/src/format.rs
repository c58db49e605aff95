//! Renderings of a script diff.
//!
//! Text output is one header line per section, `~` changed, `+` added,
//! `-` removed, `=` unchanged, `!` structural, followed by the affected
//! lines indented under it. JSON output is a single object holding the
//! summary counts and the entries.

use serde::Serialize;

use crate::diff::{DiffEntry, DiffSummary};

const BODY_INDENT: &str = "    ";

pub fn format_text(entries: &[DiffEntry]) -> String {
    let mut lines = Vec::new();
    for entry in entries {
        match entry {
            DiffEntry::Unchanged { path } => lines.push(format!("= {path}")),
            DiffEntry::Changed {
                path,
                marker,
                removed,
                added,
            } => {
                lines.push(format!("~ {path}"));
                if let Some(marker) = marker {
                    lines.push(format!(
                        "{BODY_INDENT}marker: {} -> {}",
                        or_none(&marker.before),
                        or_none(&marker.after)
                    ));
                }
                lines.extend(removed.iter().map(|l| format!("{BODY_INDENT}- {l}")));
                lines.extend(added.iter().map(|l| format!("{BODY_INDENT}+ {l}")));
            }
            DiffEntry::Removed { path, marker, body } => {
                lines.push(headline('-', path, marker, body.len()));
                lines.extend(body.iter().map(|l| format!("{BODY_INDENT}- {l}")));
            }
            DiffEntry::Added { path, marker, body } => {
                lines.push(headline('+', path, marker, body.len()));
                lines.extend(body.iter().map(|l| format!("{BODY_INDENT}+ {l}")));
            }
            DiffEntry::Structural { path, description } => {
                lines.push(format!("! {path}: {description}"));
            }
        }
    }
    lines.join("\n")
}

pub fn format_summary(entries: &[DiffEntry]) -> String {
    DiffSummary::of(entries).to_string()
}

#[derive(Serialize)]
struct DiffReport<'a> {
    summary: DiffSummary,
    entries: &'a [DiffEntry],
}

pub fn format_json(entries: &[DiffEntry]) -> String {
    let report = DiffReport {
        summary: DiffSummary::of(entries),
        entries,
    };
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

fn headline(sign: char, path: &str, marker: &str, lines: usize) -> String {
    let noun = if lines == 1 { "line" } else { "lines" };
    if marker.is_empty() {
        format!("{sign} {path} ({lines} {noun})")
    } else {
        format!("{sign} {path} {marker} ({lines} {noun})")
    }
}

fn or_none(marker: &str) -> &str {
    if marker.is_empty() {
        "(none)"
    } else {
        marker
    }
}

#[cfg(test)]
mod tests {
    use super::{format_json, format_text};
    use crate::diff::{DiffEntry, MarkerChange};

    fn entries() -> Vec<DiffEntry> {
        vec![
            DiffEntry::Changed {
                path: "script.file_etc_hosts".to_string(),
                marker: Some(MarkerChange {
                    before: String::new(),
                    after: "after=pkg_base".to_string(),
                }),
                removed: vec!["echo old".to_string()],
                added: vec!["echo new".to_string()],
            },
            DiffEntry::Added {
                path: "script.user_alice".to_string(),
                marker: "after=proceed".to_string(),
                body: vec!["id -u alice".to_string()],
            },
        ]
    }

    #[test]
    fn text_lists_sections_with_their_lines() {
        assert_eq!(
            format_text(&entries()),
            "~ script.file_etc_hosts\n    marker: (none) -> after=pkg_base\n    - echo old\n    + echo new\n\
             + script.user_alice after=proceed (1 line)\n    + id -u alice"
        );
    }

    #[test]
    fn json_wraps_entries_with_summary() {
        let value: serde_json::Value = serde_json::from_str(&format_json(&entries())).expect("json");
        assert_eq!(value["summary"]["changed"], 1);
        assert_eq!(value["summary"]["lines_added"], 2);
        assert_eq!(value["entries"][0]["change"], "changed");
        assert_eq!(value["entries"][1]["marker"], "after=proceed");
    }
}
