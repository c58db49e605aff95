use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::tree::ScriptNode;
use crate::writer::{SECTION_BEGIN, SECTION_END};

/// Errors that can occur while reading a rendered script back into a tree.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Input bytes were not valid UTF-8.
    #[error("invalid UTF-8 in script: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// Failed to read input file.
    #[error("failed to read script file: {0}")]
    Io(#[from] std::io::Error),
    /// Section markers do not nest.
    #[error("malformed script at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Parse rendered script text into a [`ScriptNode`] document.
///
/// Sections are rebuilt from their marker comments. Everything between
/// markers comes back as raw [`crate::NodeKind::Line`] nodes (indentation kept),
/// unindented `#` lines as comments and empty lines as blanks, so rendering the
/// result reproduces the input byte for byte.
pub fn parse(text: &[u8]) -> Result<ScriptNode, ParseError> {
    let text = String::from_utf8(text.to_vec())?;
    let mut stack: Vec<ScriptNode> = vec![ScriptNode::document()];

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;

        if idx == 0 && raw.starts_with("#!") {
            if let Some(doc) = stack.first_mut() {
                doc.text = Some(raw.to_string());
            }
            continue;
        }

        if let Some(marker) = raw.trim_start().strip_prefix(SECTION_BEGIN) {
            stack.push(section_from_marker(marker));
            continue;
        }

        if let Some(name) = raw.trim_start().strip_prefix(SECTION_END) {
            if stack.len() < 2 {
                return Err(ParseError::Malformed {
                    line: line_no,
                    message: format!("section end '{name}' without open section"),
                });
            }
            let node = stack.pop().ok_or_else(|| ParseError::Malformed {
                line: line_no,
                message: "empty section stack".to_string(),
            })?;
            if node.name != name.trim() {
                return Err(ParseError::Malformed {
                    line: line_no,
                    message: format!(
                        "section end '{}' does not match open section '{}'",
                        name.trim(),
                        node.name
                    ),
                });
            }
            if let Some(parent) = stack.last_mut() {
                parent.children.push(node);
            }
            continue;
        }

        let node = if raw.is_empty() {
            ScriptNode::blank()
        } else if raw == "#" {
            ScriptNode::comment("")
        } else if let Some(comment) = raw.strip_prefix("# ") {
            ScriptNode::comment(comment)
        } else {
            ScriptNode::line(raw)
        };
        if let Some(current) = stack.last_mut() {
            current.children.push(node);
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|n| n.name.clone()).unwrap_or_default();
        return Err(ParseError::Malformed {
            line: text.lines().count(),
            message: format!("unclosed section '{open}' at end of script"),
        });
    }

    stack.pop().ok_or_else(|| ParseError::Malformed {
        line: 0,
        message: "no document".to_string(),
    })
}

/// Parse a rendered script file into a [`ScriptNode`] document.
pub fn parse_file(path: &Path) -> Result<ScriptNode, ParseError> {
    let bytes = fs::read(path)?;
    parse(&bytes)
}

fn section_from_marker(marker: &str) -> ScriptNode {
    let mut parts = marker.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let mut node = ScriptNode::section(name);
    for part in parts {
        if let Some((key, value)) = part.split_once('=') {
            node.attributes.insert(key.to_string(), value.to_string());
        }
    }
    node
}
