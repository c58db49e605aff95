use std::collections::BTreeMap;

use crate::diff::{DiffEntry, DiffOptions, MarkerChange};
use crate::tree::{NodeKind, ScriptNode};
use crate::writer::render;

pub(super) fn compare(
    left: &ScriptNode,
    right: &ScriptNode,
    path: &str,
    opts: &DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    if left.kind != right.kind {
        out.push(DiffEntry::Structural {
            path: path.to_string(),
            description: format!("{:?} on the left, {:?} on the right", left.kind, right.kind),
        });
        return;
    }

    let start = out.len();
    let (before, after) = (marker(left), marker(right));
    let marker = (before != after).then_some(MarkerChange { before, after });
    let (removed, added) = line_changes(&body_lines(left), &body_lines(right));
    if marker.is_some() || !removed.is_empty() || !added.is_empty() {
        out.push(DiffEntry::Changed {
            path: path.to_string(),
            marker,
            removed,
            added,
        });
    }

    compare_sections(left, right, path, opts, out);

    if opts.include_identical && left.kind == NodeKind::Section && out.len() == start {
        out.push(DiffEntry::Unchanged {
            path: path.to_string(),
        });
    }
}

fn compare_sections(
    left: &ScriptNode,
    right: &ScriptNode,
    path: &str,
    opts: &DiffOptions,
    out: &mut Vec<DiffEntry>,
) {
    let mut names: Vec<&str> = Vec::new();
    for section in left.sections().chain(right.sections()) {
        if !names.contains(&section.name.as_str()) {
            names.push(section.name.as_str());
        }
    }

    for name in names {
        if opts.ignore_sections.iter().any(|ignored| ignored == name) {
            continue;
        }
        let lefts = left.get_children(name);
        let rights = right.get_children(name);
        let count = lefts.len().max(rights.len());
        if count > 1 && lefts.len() != rights.len() {
            out.push(DiffEntry::Structural {
                path: format!("{path}.{name}"),
                description: format!(
                    "'{name}' occurs {} times on the left and {} on the right",
                    lefts.len(),
                    rights.len()
                ),
            });
        }
        for i in 0..count {
            let child = if count == 1 {
                format!("{path}.{name}")
            } else {
                format!("{path}.{name}[{}]", i + 1)
            };
            match (lefts.get(i), rights.get(i)) {
                (Some(l), Some(r)) => compare(l, r, &child, opts, out),
                (Some(l), None) => out.push(DiffEntry::Removed {
                    path: child,
                    marker: marker(l),
                    body: section_lines(l),
                }),
                (None, Some(r)) => out.push(DiffEntry::Added {
                    path: child,
                    marker: marker(r),
                    body: section_lines(r),
                }),
                (None, None) => {}
            }
        }
    }
}

fn marker(node: &ScriptNode) -> String {
    node.attributes
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Rendered lines of a node's own body, nested sections and blank lines
/// left out.
fn body_lines(node: &ScriptNode) -> Vec<String> {
    let mut lines = Vec::new();
    if node.kind == NodeKind::Document {
        lines.extend(node.text.iter().cloned());
    }
    for child in &node.children {
        if matches!(child.kind, NodeKind::Section | NodeKind::Blank) {
            continue;
        }
        lines.extend(rendered_lines(child));
    }
    lines
}

/// Everything between a section's markers, nested sections included.
fn section_lines(node: &ScriptNode) -> Vec<String> {
    node.children.iter().flat_map(rendered_lines).collect()
}

/// Indentation is layout, not content.
fn rendered_lines(node: &ScriptNode) -> Vec<String> {
    render(node)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Lines only on the left and lines only on the right, each in its own
/// order. A line that occurs on both sides cancels once per occurrence, so
/// one inserted line does not report everything after it.
fn line_changes(left: &[String], right: &[String]) -> (Vec<String>, Vec<String>) {
    let mut available: BTreeMap<&str, usize> = BTreeMap::new();
    for line in right {
        *available.entry(line.as_str()).or_default() += 1;
    }
    let mut removed = Vec::new();
    for line in left {
        match available.get_mut(line.as_str()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => removed.push(line.clone()),
        }
    }

    let mut available: BTreeMap<&str, usize> = BTreeMap::new();
    for line in left {
        *available.entry(line.as_str()).or_default() += 1;
    }
    let mut added = Vec::new();
    for line in right {
        match available.get_mut(line.as_str()) {
            Some(n) if *n > 0 => *n -= 1,
            _ => added.push(line.clone()),
        }
    }
    (removed, added)
}
