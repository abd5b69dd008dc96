//! Python parsing wrapper used by the hashing and tagging passes.
//!
//! tree-sitter produces the concrete syntax tree; it is immediately copied
//! into a [`SyntaxTree`] arena so callers never hold tree-sitter cursors.

use tracing::debug;

use crate::errors::{AthenaError, AthenaResult};
use crate::indexer::syntax::{NodeId, SyntaxNode, SyntaxTree};

pub const PYTHON_EXTENSION: &str = "py";

pub struct PythonParser {
    parser: tree_sitter::Parser,
}

impl PythonParser {
    pub fn new() -> AthenaResult<Self> {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| AthenaError::Parse(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse Python source into an arena tree.
    ///
    /// Sources with syntax errors still produce a tree; tree-sitter marks the
    /// broken region with `ERROR` nodes and the rest stays usable.
    pub fn parse(&mut self, source: &str) -> AthenaResult<SyntaxTree> {
        let tree = self
            .parser
            .parse(source.as_bytes(), None)
            .ok_or_else(|| AthenaError::Parse("tree-sitter returned no tree".to_string()))?;
        let has_error = tree.root_node().has_error();
        if has_error {
            debug!("source contains syntax errors; continuing with partial tree");
        }
        Ok(build_arena(&tree, source.to_string(), has_error))
    }
}

/// Parse with a throwaway parser.
pub fn parse_source(source: &str) -> AthenaResult<SyntaxTree> {
    PythonParser::new()?.parse(source)
}

fn build_arena(tree: &tree_sitter::Tree, source: String, has_error: bool) -> SyntaxTree {
    let mut arena = SyntaxTree::new(source, has_error);
    let mut cursor = tree.walk();
    // Ancestors of the cursor's current node, innermost last.
    let mut ancestors: Vec<NodeId> = Vec::new();

    loop {
        let node = cursor.node();
        let id = arena.push(SyntaxNode {
            kind: node.kind(),
            named: node.is_named(),
            field: cursor.field_name(),
            start_byte: node.start_byte(),
            end_byte: node.end_byte(),
            start_line: node.start_position().row,
            end_line: node.end_position().row,
            parent: ancestors.last().copied(),
            children: Vec::new(),
        });

        if cursor.goto_first_child() {
            ancestors.push(id);
            continue;
        }

        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return arena;
            }
            ancestors.pop();
        }
    }
}
