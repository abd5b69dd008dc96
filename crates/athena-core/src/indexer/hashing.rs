//! Content fingerprints for functions, classes, modules and packages.
//!
//! A fingerprint is the first 12 hex digits of SHA-256 over a canonical
//! serialization of the entity's syntax tree. The serialization is a
//! pre-order walk emitting `kind` for structural nodes and `kind:text` for
//! identifiers and literals, joined with `|`. Whitespace and comments never
//! reach it, and neither does the entity's own docstring, so rewriting the
//! `@athena:` tag cannot change the hash it records.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use crate::errors::{AthenaError, AthenaResult};
use crate::indexer::symbols::{docstring_span, string_span, LocatedEntity};
use crate::indexer::syntax::{NodeId, SyntaxTree};
use crate::models::EntityKind;

/// Number of hex digits kept from the SHA-256 digest.
pub const HASH_LENGTH: usize = 12;

const SEPARATOR: &str = "|";

/// Node kinds whose source text is part of the serialization.
const TEXT_BEARING_KINDS: &[&str] = &["identifier", "integer", "float", "string"];

static TAG_STRIP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@athena:\s*[0-9a-f]{12}").unwrap());

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// How docstrings other than the hashed entity's own are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NestedDocstrings {
    /// Every docstring at every depth is left out (module hashing).
    Exclude,
    /// Nested docstrings contribute their prose with tag lines removed
    /// (function and class hashing).
    Prose,
}

/// Serialize a subtree into its canonical string form.
///
/// `own_docstring` is the statement skipped outright; other docstrings are
/// handled according to `nested`.
pub fn serialize_ast_node(
    tree: &SyntaxTree,
    node: NodeId,
    own_docstring: Option<NodeId>,
    nested: NestedDocstrings,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut stack = vec![node];

    while let Some(current) = stack.pop() {
        let kind = tree.kind(current);
        if kind == "comment" {
            continue;
        }

        if Some(current) == own_docstring {
            continue;
        }
        if tree.is_docstring(current) {
            if nested == NestedDocstrings::Prose {
                let prose = docstring_prose(tree, current);
                if !prose.is_empty() {
                    parts.push(format!("docstring:{prose}"));
                }
            }
            continue;
        }

        if TEXT_BEARING_KINDS.contains(&kind) {
            parts.push(format!("{kind}:{}", tree.text(current)));
        } else {
            parts.push(kind.to_string());
        }

        stack.extend(tree.children(current).iter().rev().copied());
    }

    parts.join(SEPARATOR)
}

/// Docstring text between its delimiters, with every `@athena:` tag removed
/// and whitespace collapsed. Quote style therefore does not matter either.
fn docstring_prose(tree: &SyntaxTree, statement: NodeId) -> String {
    let content = tree
        .named_children(statement)
        .next()
        .and_then(|string| string_span(tree, statement, string))
        .and_then(|span| tree.source().get(span.content))
        .unwrap_or("");
    let untagged = TAG_STRIP_RE.replace_all(content, "");
    untagged.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Hashes
// ---------------------------------------------------------------------------

/// SHA-256 of `content`, truncated to [`HASH_LENGTH`] hex characters.
pub fn compute_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex = format!("{digest:x}");
    hex[..HASH_LENGTH].to_string()
}

/// Hash a function or method: decorators, signature and body, minus its
/// own docstring.
pub fn compute_function_hash(tree: &SyntaxTree, entity: &LocatedEntity) -> String {
    definition_hash(tree, entity)
}

/// Hash a class: declaration and every member, minus its own docstring.
pub fn compute_class_hash(tree: &SyntaxTree, entity: &LocatedEntity) -> String {
    definition_hash(tree, entity)
}

fn definition_hash(tree: &SyntaxTree, entity: &LocatedEntity) -> String {
    let own = docstring_span(tree, entity.definition).map(|span| span.statement);
    let serialization = serialize_ast_node(tree, entity.extent, own, NestedDocstrings::Prose);
    compute_hash(&serialization)
}

/// Hash a whole module, with docstrings excluded at every level.
pub fn compute_module_hash(tree: &SyntaxTree) -> String {
    let serialization = serialize_ast_node(tree, tree.root(), None, NestedDocstrings::Exclude);
    compute_hash(&serialization)
}

/// Hash a package from its manifest of immediate children.
///
/// Only names take part, so adding, removing or renaming a module changes
/// the hash while editing a module's body does not.
pub fn compute_package_hash(manifest: &[String]) -> String {
    let mut sorted: Vec<&str> = manifest.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    compute_hash(&sorted.join(SEPARATOR))
}

/// Dispatch on the located entity's kind.
///
/// Packages are hashed from the filesystem, not from a syntax tree, so they
/// are rejected here.
pub fn compute_entity_hash(tree: &SyntaxTree, entity: &LocatedEntity) -> AthenaResult<String> {
    match entity.kind {
        EntityKind::Function | EntityKind::Method => Ok(compute_function_hash(tree, entity)),
        EntityKind::Class => Ok(compute_class_hash(tree, entity)),
        EntityKind::Module => Ok(compute_module_hash(tree)),
        EntityKind::Package => Err(AthenaError::Unsupported(
            "package hashes are computed from the package manifest".to_string(),
        )),
    }
}
