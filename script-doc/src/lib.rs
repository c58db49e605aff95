//! Ordered document tree used to build shell scripts without string
//! concatenation, render them once, read them back and diff them.

pub mod diff;
pub mod format;
pub mod parser;
pub mod tree;
pub mod writer;

pub use diff::{diff, diff_with_options, DiffEntry, DiffOptions, DiffSummary, MarkerChange};
pub use format::{format_json, format_summary, format_text};
pub use parser::{parse, parse_file, ParseError};
pub use tree::{NodeKind, ScriptNode};
pub use writer::{render, shell_quote, write, write_file, WriteError};
