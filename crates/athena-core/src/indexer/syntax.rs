//! Index-addressed syntax tree.
//!
//! The parser copies every tree-sitter node into a flat arena once, so the
//! hasher and the tag manager walk plain indices instead of borrowing
//! cursors tied to a parse tree. A tree is only valid for the source text it
//! was built from; any rewrite of that text requires a fresh parse.

use std::ops::Range;

/// Index of a node inside a [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

#[derive(Debug, Clone)]
pub struct SyntaxNode {
    pub kind: &'static str,
    pub named: bool,
    /// Field name under which the node hangs off its parent, if any.
    pub field: Option<&'static str>,
    pub start_byte: usize,
    pub end_byte: usize,
    /// 0-based rows.
    pub start_line: usize,
    pub end_line: usize,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl SyntaxNode {
    pub fn byte_range(&self) -> Range<usize> {
        self.start_byte..self.end_byte
    }
}

#[derive(Debug, Clone)]
pub struct SyntaxTree {
    source: String,
    nodes: Vec<SyntaxNode>,
    has_error: bool,
}

impl SyntaxTree {
    pub(crate) fn new(source: String, has_error: bool) -> Self {
        Self {
            source,
            nodes: Vec::new(),
            has_error,
        }
    }

    pub(crate) fn push(&mut self, mut node: SyntaxNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        node.children.clear();
        if let Some(parent) = node.parent {
            self.nodes[parent.0].children.push(id);
        }
        self.nodes.push(node);
        id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &SyntaxNode {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &'static str {
        self.nodes[id.0].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].named)
    }

    pub fn child_by_field(&self, id: NodeId, field: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].field == Some(field))
    }

    pub fn child_of_kind(&self, id: NodeId, kind: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].kind == kind)
    }

    /// Exact source text covered by a node.
    pub fn text(&self, id: NodeId) -> &str {
        self.source
            .get(self.nodes[id.0].byte_range())
            .unwrap_or("")
    }

    /// First statement of a `block` or `module`, ignoring comments.
    pub fn first_statement(&self, scope: NodeId) -> Option<NodeId> {
        self.named_children(scope)
            .find(|c| self.nodes[c.0].kind != "comment")
    }

    /// Whether `id` is a docstring: an expression statement holding only a
    /// string literal, placed first in a `block` or at the top of a module.
    ///
    /// Any block qualifies, so a leading string in an `if` or `for` body is
    /// treated like a function's docstring.
    pub fn is_docstring(&self, id: NodeId) -> bool {
        if self.kind(id) != "expression_statement" {
            return false;
        }
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if !matches!(self.kind(parent), "module" | "block") {
            return false;
        }
        if self.first_statement(parent) != Some(id) {
            return false;
        }
        let mut named = self.named_children(id);
        matches!(
            (named.next(), named.next()),
            (Some(only), None) if self.kind(only) == "string"
        )
    }

    /// Leading whitespace of the line on which `byte` sits, when only
    /// whitespace precedes it on that line.
    pub fn line_indent(&self, byte: usize) -> Option<&str> {
        let line_start = self.source[..byte].rfind('\n').map_or(0, |i| i + 1);
        let prefix = &self.source[line_start..byte];
        prefix
            .chars()
            .all(|c| c == ' ' || c == '\t')
            .then_some(prefix)
    }

    /// Leading whitespace of the line containing `byte`, regardless of what
    /// follows it.
    pub fn indent_of_line(&self, byte: usize) -> &str {
        let line_start = self.source[..byte].rfind('\n').map_or(0, |i| i + 1);
        let rest = &self.source[line_start..];
        let width = rest
            .find(|c: char| c != ' ' && c != '\t')
            .unwrap_or(rest.len());
        &rest[..width]
    }
}
