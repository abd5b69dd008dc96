//! Entity extraction and lookup over a parsed Python module.
//!
//! Only the shapes athena tags are considered: top-level functions and
//! classes, and methods defined directly in a class body. Each may be
//! wrapped in a `decorated_definition`, whose span then becomes the
//! entity's extent.

use std::ops::Range;

use crate::indexer::syntax::{NodeId, SyntaxTree};
use crate::models::{Entity, EntityInfo, EntityKind, Location, Parameter, Signature};
use crate::sync::entity_path::EntityPath;

// ---------------------------------------------------------------------------
// Located definitions
// ---------------------------------------------------------------------------

/// A definition node found in a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocatedEntity {
    pub kind: EntityKind,
    /// The `function_definition` / `class_definition` node.
    pub definition: NodeId,
    /// The node covering decorators too; equals `definition` when undecorated.
    pub extent: NodeId,
}

impl LocatedEntity {
    pub fn location(&self, tree: &SyntaxTree) -> Location {
        let node = tree.node(self.extent);
        Location {
            start: node.start_line,
            end: node.end_line,
        }
    }
}

/// Unwrap a statement into `(definition, extent)` when it defines a function
/// or class.
fn as_definition(tree: &SyntaxTree, statement: NodeId) -> Option<(NodeId, NodeId)> {
    match tree.kind(statement) {
        "function_definition" | "class_definition" => Some((statement, statement)),
        "decorated_definition" => {
            let inner = tree.child_by_field(statement, "definition").or_else(|| {
                tree.named_children(statement).find(|c| {
                    matches!(tree.kind(*c), "function_definition" | "class_definition")
                })
            })?;
            Some((inner, statement))
        }
        _ => None,
    }
}

pub fn definition_name<'a>(tree: &'a SyntaxTree, definition: NodeId) -> Option<&'a str> {
    tree.child_by_field(definition, "name").map(|n| tree.text(n))
}

pub fn definition_body(tree: &SyntaxTree, definition: NodeId) -> Option<NodeId> {
    tree.child_by_field(definition, "body")
        .or_else(|| tree.child_of_kind(definition, "block"))
}

fn top_level_definitions(tree: &SyntaxTree) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
    tree.named_children(tree.root())
        .filter_map(move |stmt| as_definition(tree, stmt))
}

fn methods_of(tree: &SyntaxTree, class: NodeId) -> Vec<(NodeId, NodeId)> {
    let Some(body) = definition_body(tree, class) else {
        return Vec::new();
    };
    tree.named_children(body)
        .filter_map(|stmt| as_definition(tree, stmt))
        .filter(|(definition, _)| tree.kind(*definition) == "function_definition")
        .collect()
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract functions, classes and methods in file order.
pub fn extract_entities(tree: &SyntaxTree, file_path: &str) -> Vec<Entity> {
    let mut entities = Vec::new();

    for (definition, extent) in top_level_definitions(tree) {
        let Some(name) = definition_name(tree, definition) else {
            continue;
        };
        let kind = if tree.kind(definition) == "class_definition" {
            EntityKind::Class
        } else {
            EntityKind::Function
        };
        let located = LocatedEntity {
            kind,
            definition,
            extent,
        };
        entities.push(Entity {
            kind,
            path: file_path.to_string(),
            name: name.to_string(),
            extent: located.location(tree),
        });

        if kind != EntityKind::Class {
            continue;
        }
        for (method, method_extent) in methods_of(tree, definition) {
            let Some(method_name) = definition_name(tree, method) else {
                continue;
            };
            let located = LocatedEntity {
                kind: EntityKind::Method,
                definition: method,
                extent: method_extent,
            };
            entities.push(Entity {
                kind: EntityKind::Method,
                path: file_path.to_string(),
                name: format!("{name}.{method_name}"),
                extent: located.location(tree),
            });
        }
    }

    entities
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

fn find_top_level(tree: &SyntaxTree, name: &str) -> Option<(NodeId, NodeId)> {
    top_level_definitions(tree)
        .find(|(definition, _)| definition_name(tree, *definition) == Some(name))
}

/// Find the definition an entity path points at.
///
/// `Class.method` references search the named class's body; bare names
/// match a top-level function or class. Module- and package-level paths
/// have no definition and yield `None`.
pub fn locate(tree: &SyntaxTree, entity_path: &EntityPath) -> Option<LocatedEntity> {
    if let (Some(class_name), Some(method_name)) =
        (entity_path.class_name.as_deref(), entity_path.method_name.as_deref())
    {
        let (class, _) = find_top_level(tree, class_name)?;
        if tree.kind(class) != "class_definition" {
            return None;
        }
        let (definition, extent) = methods_of(tree, class)
            .into_iter()
            .find(|(method, _)| definition_name(tree, *method) == Some(method_name))?;
        return Some(LocatedEntity {
            kind: EntityKind::Method,
            definition,
            extent,
        });
    }

    let name = entity_path.entity_name.as_deref()?;
    let (definition, extent) = find_top_level(tree, name)?;
    let kind = if tree.kind(definition) == "class_definition" {
        EntityKind::Class
    } else {
        EntityKind::Function
    };
    Some(LocatedEntity {
        kind,
        definition,
        extent,
    })
}

// ---------------------------------------------------------------------------
// Docstrings
// ---------------------------------------------------------------------------

/// Byte layout of a docstring literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocstringSpan {
    /// The enclosing `expression_statement`.
    pub statement: NodeId,
    /// The whole literal, prefix and quotes included.
    pub literal: Range<usize>,
    /// Text between the opening and closing quotes.
    pub content: Range<usize>,
    /// String prefix such as `r` or `u`.
    pub prefix: String,
    pub quote: char,
    pub triple_quoted: bool,
}

/// The body whose first statement would hold the docstring of `scope`:
/// the block of a definition, or the module itself.
pub fn docstring_scope(tree: &SyntaxTree, scope: NodeId) -> Option<NodeId> {
    match tree.kind(scope) {
        "module" => Some(scope),
        "function_definition" | "class_definition" => definition_body(tree, scope),
        _ => None,
    }
}

/// Locate the docstring of a definition or module node.
pub fn docstring_span(tree: &SyntaxTree, scope: NodeId) -> Option<DocstringSpan> {
    let body = docstring_scope(tree, scope)?;
    let statement = tree.first_statement(body)?;
    if !tree.is_docstring(statement) {
        return None;
    }
    let string = tree.named_children(statement).next()?;
    string_span(tree, statement, string)
}

/// Byte layout of the string literal `string` held by `statement`.
pub(crate) fn string_span(
    tree: &SyntaxTree,
    statement: NodeId,
    string: NodeId,
) -> Option<DocstringSpan> {
    let literal = tree.node(string).byte_range();
    let text = tree.text(string);

    let prefix_len = text.find(|c: char| c == '"' || c == '\'')?;
    let quote = text[prefix_len..].chars().next()?;
    let triple: String = std::iter::repeat(quote).take(3).collect();
    let triple_quoted = text[prefix_len..].starts_with(&triple) && text.len() >= prefix_len + 6;
    let delimiter = if triple_quoted { 3 } else { 1 };

    let content_start = literal.start + prefix_len + delimiter;
    let content_end = literal.end.checked_sub(delimiter)?;
    if content_end < content_start {
        return None;
    }

    Some(DocstringSpan {
        statement,
        literal,
        content: content_start..content_end,
        prefix: text[..prefix_len].to_string(),
        quote,
        triple_quoted,
    })
}

/// Docstring text of a definition or module, without quotes and trimmed.
pub fn extract_docstring(tree: &SyntaxTree, scope: NodeId) -> Option<String> {
    let span = docstring_span(tree, scope)?;
    tree.source()
        .get(span.content)
        .map(|text| text.trim().to_string())
}

// ---------------------------------------------------------------------------
// Signatures and entity info
// ---------------------------------------------------------------------------

fn field_text(tree: &SyntaxTree, node: NodeId, field: &str) -> Option<String> {
    tree.child_by_field(node, field)
        .map(|child| tree.text(child).to_string())
}

/// Name of a parameter node, keeping `*` / `**` on splats.
fn parameter_name(tree: &SyntaxTree, node: NodeId) -> Option<String> {
    match tree.kind(node) {
        "identifier" | "list_splat_pattern" | "dictionary_splat_pattern" => {
            Some(tree.text(node).to_string())
        }
        "typed_parameter" => tree
            .named_children(node)
            .find(|c| {
                matches!(
                    tree.kind(*c),
                    "identifier" | "list_splat_pattern" | "dictionary_splat_pattern"
                )
            })
            .map(|c| tree.text(c).to_string()),
        "default_parameter" | "typed_default_parameter" => field_text(tree, node, "name"),
        _ => None,
    }
}

/// Parameters of a function definition in declaration order.
///
/// The bare `*` and `/` separators are not parameters and are left out.
pub fn extract_parameters(tree: &SyntaxTree, definition: NodeId) -> Vec<Parameter> {
    let Some(parameters) = tree.child_by_field(definition, "parameters") else {
        return Vec::new();
    };
    tree.named_children(parameters)
        .filter_map(|node| {
            let name = parameter_name(tree, node)?;
            let (annotation, default) = match tree.kind(node) {
                "typed_parameter" => (field_text(tree, node, "type"), None),
                "default_parameter" => (None, field_text(tree, node, "value")),
                "typed_default_parameter" => (
                    field_text(tree, node, "type"),
                    field_text(tree, node, "value"),
                ),
                _ => (None, None),
            };
            Some(Parameter {
                name,
                annotation,
                default,
            })
        })
        .collect()
}

/// The `-> T` annotation of a function definition, without the arrow.
pub fn extract_return_type(tree: &SyntaxTree, definition: NodeId) -> Option<String> {
    field_text(tree, definition, "return_type")
}

/// Location, signature and docstring of the entity an entity path names.
///
/// A path without an entity describes the module: its extent spans every
/// line and its summary is the module docstring.
pub fn extract_entity_info(tree: &SyntaxTree, entity_path: &EntityPath) -> Option<EntityInfo> {
    if !entity_path.has_entity() {
        let lines = tree.source().lines().count();
        return Some(EntityInfo {
            kind: EntityKind::Module,
            path: entity_path.file_path.clone(),
            extent: Location {
                start: 0,
                end: lines.saturating_sub(1),
            },
            sig: None,
            summary: extract_docstring(tree, tree.root()),
        });
    }

    let entity = locate(tree, entity_path)?;
    let sig = match entity.kind {
        EntityKind::Function | EntityKind::Method => Some(Signature {
            name: definition_name(tree, entity.definition)
                .unwrap_or_default()
                .to_string(),
            args: extract_parameters(tree, entity.definition),
            return_type: extract_return_type(tree, entity.definition),
        }),
        _ => None,
    };
    Some(EntityInfo {
        kind: entity.kind,
        path: entity_path.file_path.clone(),
        extent: entity.location(tree),
        sig,
        summary: extract_docstring(tree, entity.definition),
    })
}
