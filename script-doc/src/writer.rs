use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::tree::{NodeKind, ScriptNode};

/// Marker opening a section in rendered output.
pub const SECTION_BEGIN: &str = "# >>> ";
/// Marker closing a section in rendered output.
pub const SECTION_END: &str = "# <<< ";

const INDENT: &str = "    ";

/// Errors that can occur while writing a rendered script.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Failed to write output file.
    #[error("failed to write script file: {0}")]
    Io(#[from] std::io::Error),
}

/// Render a [`ScriptNode`] tree to shell text. Output always ends with a newline.
pub fn render(node: &ScriptNode) -> String {
    let mut out = String::new();
    render_node(&mut out, node, 0);
    out
}

/// Render a [`ScriptNode`] tree into bytes.
pub fn write(node: &ScriptNode) -> Vec<u8> {
    render(node).into_bytes()
}

/// Render a [`ScriptNode`] tree and write it to `path`.
pub fn write_file(node: &ScriptNode, path: &Path) -> Result<(), WriteError> {
    fs::write(path, write(node))?;
    Ok(())
}

/// Quote `value` as a single POSIX shell word.
///
/// Everything goes inside single quotes; embedded single quotes become `'\''`.
pub fn shell_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push_str("'\\''");
        } else {
            out.push(ch);
        }
    }
    out.push('\'');
    out
}

fn render_node(out: &mut String, node: &ScriptNode, depth: usize) {
    match node.kind {
        NodeKind::Document => {
            if let Some(text) = &node.text {
                push_line(out, text, 0);
            }
            for child in &node.children {
                render_node(out, child, depth);
            }
        }
        NodeKind::Section => {
            push_line(out, &section_begin(node), depth);
            for child in &node.children {
                render_node(out, child, depth);
            }
            push_line(out, &format!("{SECTION_END}{}", node.name), depth);
        }
        NodeKind::Block => {
            if let Some(open) = &node.text {
                push_line(out, open, depth);
            }
            for child in &node.children {
                render_node(out, child, depth + 1);
            }
            if let Some(close) = &node.close {
                push_line(out, close, depth);
            }
        }
        NodeKind::Line => push_line(out, node.text.as_deref().unwrap_or_default(), depth),
        NodeKind::Comment => {
            let text = node.text.as_deref().unwrap_or_default();
            if text.is_empty() {
                push_line(out, "#", depth);
            }
            for line in text.lines() {
                if line.is_empty() {
                    push_line(out, "#", depth);
                } else {
                    push_line(out, &format!("# {line}"), depth);
                }
            }
        }
        NodeKind::Blank => out.push('\n'),
    }
}

fn section_begin(node: &ScriptNode) -> String {
    let mut marker = format!("{SECTION_BEGIN}{}", node.name);
    for (key, value) in &node.attributes {
        marker.push(' ');
        marker.push_str(key);
        marker.push('=');
        marker.push_str(value);
    }
    marker
}

/// Indent only the first physical line; here-document bodies and their
/// terminators must stay at column zero.
fn push_line(out: &mut String, text: &str, depth: usize) {
    let mut lines = text.split('\n');
    if let Some(first) = lines.next() {
        if !first.is_empty() {
            for _ in 0..depth {
                out.push_str(INDENT);
            }
        }
        out.push_str(first);
        out.push('\n');
    }
    for rest in lines {
        out.push_str(rest);
        out.push('\n');
    }
}
