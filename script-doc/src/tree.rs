use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// What a [`ScriptNode`] renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Whole script. Optional text is the interpreter line.
    Document,
    /// Named region delimited by marker comments.
    Section,
    /// Opening line, indented children, closing line (`if`/`fi` and friends).
    Block,
    /// One shell line. Continuation lines of multi-line text are emitted raw.
    Line,
    /// A `#` comment.
    Comment,
    /// An empty line.
    Blank,
}

/// A generic shell script tree node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScriptNode {
    /// Node kind.
    pub kind: NodeKind,
    /// Section name. Empty for every other kind.
    pub name: String,
    /// Section metadata, written into the opening marker.
    pub attributes: BTreeMap<String, String>,
    /// Child nodes in render order.
    pub children: Vec<ScriptNode>,
    /// Line, comment or block-opening text.
    pub text: Option<String>,
    /// Block closing line.
    pub close: Option<String>,
}

impl ScriptNode {
    fn empty(kind: NodeKind) -> Self {
        Self {
            kind,
            name: String::new(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
            close: None,
        }
    }

    /// Create an empty document.
    pub fn document() -> Self {
        Self::empty(NodeKind::Document)
    }

    /// Create an empty named section.
    pub fn section(name: impl Into<String>) -> Self {
        let mut node = Self::empty(NodeKind::Section);
        node.name = name.into();
        node
    }

    /// Create a block with the given opening and closing lines.
    pub fn block(open: impl Into<String>, close: impl Into<String>) -> Self {
        let mut node = Self::empty(NodeKind::Block);
        node.text = Some(open.into());
        node.close = Some(close.into());
        node
    }

    /// Create a single line.
    pub fn line(text: impl Into<String>) -> Self {
        let mut node = Self::empty(NodeKind::Line);
        node.text = Some(text.into());
        node
    }

    /// Create a comment line. The leading `# ` is added at render time.
    pub fn comment(text: impl Into<String>) -> Self {
        let mut node = Self::empty(NodeKind::Comment);
        node.text = Some(text.into());
        node
    }

    /// Create a blank line.
    pub fn blank() -> Self {
        Self::empty(NodeKind::Blank)
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: ScriptNode) -> Self {
        self.children.push(child);
        self
    }

    /// Builder-style text replacement.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Append a child and return `self` for chaining.
    pub fn push(&mut self, child: ScriptNode) -> &mut Self {
        self.children.push(child);
        self
    }

    /// Append a line child.
    pub fn push_line(&mut self, text: impl Into<String>) -> &mut Self {
        self.push(ScriptNode::line(text))
    }

    /// Append every node from `children`.
    pub fn extend<I: IntoIterator<Item = ScriptNode>>(&mut self, children: I) -> &mut Self {
        self.children.extend(children);
        self
    }

    /// Return the first child section with the provided name.
    pub fn get_child(&self, name: &str) -> Option<&ScriptNode> {
        self.children
            .iter()
            .find(|child| child.kind == NodeKind::Section && child.name == name)
    }

    /// Return all child sections with the provided name.
    pub fn get_children(&self, name: &str) -> Vec<&ScriptNode> {
        self.children
            .iter()
            .filter(|child| child.kind == NodeKind::Section && child.name == name)
            .collect()
    }

    /// Walk a nested section path and return the terminal section.
    pub fn get_path<'a>(&'a self, path: &[&str]) -> Option<&'a ScriptNode> {
        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        Some(current)
    }

    /// Direct child sections in order.
    pub fn sections(&self) -> impl Iterator<Item = &ScriptNode> {
        self.children
            .iter()
            .filter(|child| child.kind == NodeKind::Section)
    }

    /// Count of nodes in this subtree, `self` included.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ScriptNode::node_count).sum::<usize>()
    }
}

impl Display for ScriptNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&crate::writer::render(self))
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeKind, ScriptNode};

    #[test]
    fn get_path_walks_nested_sections() {
        let mut root = ScriptNode::document();
        let mut parent = ScriptNode::section("phase");
        parent.push(ScriptNode::section("unit").with_child(ScriptNode::line("true")));
        root.push(parent);

        let unit = root.get_path(&["phase", "unit"]).expect("unit section");
        assert_eq!(unit.kind, NodeKind::Section);
        assert_eq!(unit.children[0].text.as_deref(), Some("true"));
    }

    #[test]
    fn get_child_ignores_lines_with_matching_text() {
        let root = ScriptNode::document().with_child(ScriptNode::line("unit"));
        assert!(root.get_child("unit").is_none());
        assert_eq!(root.node_count(), 2);
    }
}
