//! Reading and writing `@athena: <hash>` tags inside docstrings.
//!
//! Every rewrite is a byte-range splice of the original source: only the
//! hash characters, or the freshly inserted tag text, change. Formatting,
//! comments and line endings elsewhere in the file are copied verbatim.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{AthenaError, AthenaResult};
use crate::indexer::symbols::{definition_body, docstring_span, DocstringSpan};
use crate::indexer::syntax::{NodeId, SyntaxTree};
use crate::models::EntityKind;

pub static ATHENA_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@athena:\s*([0-9a-f]{12})").unwrap());

/// PEP 263 source encoding declaration.
static ENCODING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ \t\x0c]*#.*?coding[:=][ \t]*([-\w.]+)").unwrap());

const BODY_INDENT: &str = "    ";

// ---------------------------------------------------------------------------
// Text-level helpers
// ---------------------------------------------------------------------------

/// The recorded hash in `text`. With several tags, the last one wins.
pub fn parse_athena_tag(text: &str) -> Option<String> {
    ATHENA_TAG_RE
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Docstring text carrying `hash`.
///
/// Existing tags are all rewritten in place; otherwise a tag line is
/// appended to the trimmed text. Missing or blank text becomes the bare tag.
pub fn update_athena_tag(docstring: Option<&str>, hash: &str) -> String {
    let tag = format!("@athena: {hash}");
    let text = match docstring {
        Some(text) if !text.trim().is_empty() => text,
        _ => return tag,
    };
    if ATHENA_TAG_RE.is_match(text) {
        return replace_tag_hashes(text, 0..text.len(), hash);
    }
    format!("{}\n{tag}", text.trim_end())
}

/// Replace `range` of `source` with `replacement`, copying the rest.
pub fn splice(source: &str, range: Range<usize>, replacement: &str) -> String {
    let mut out = String::with_capacity(source.len() - range.len() + replacement.len());
    out.push_str(&source[..range.start]);
    out.push_str(replacement);
    out.push_str(&source[range.end..]);
    out
}

/// Rewrite the 12-character hash of every tag inside `region` of `source`.
fn replace_tag_hashes(source: &str, region: Range<usize>, hash: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for caps in ATHENA_TAG_RE.captures_iter(&source[region.clone()]) {
        let Some(found) = caps.get(1) else {
            continue;
        };
        let start = region.start + found.start();
        out.push_str(&source[cursor..start]);
        out.push_str(hash);
        cursor = region.start + found.end();
    }
    out.push_str(&source[cursor..]);
    out
}

fn line_ending(source: &str) -> &'static str {
    if source.contains("\r\n") {
        "\r\n"
    } else {
        "\n"
    }
}

// ---------------------------------------------------------------------------
// File header
// ---------------------------------------------------------------------------

/// Leading lines that must stay at the very top of a module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileHeader {
    pub shebang: Option<String>,
    pub encoding: Option<String>,
    /// Byte offset just past the last header line.
    pub end_byte: usize,
}

/// Detect a shebang on line 1 and an encoding declaration on line 1 or 2.
pub fn detect_file_header(source: &str) -> FileHeader {
    let mut header = FileHeader::default();
    let mut lines = source.split_inclusive('\n');

    let Some(first) = lines.next() else {
        return header;
    };
    let second = lines.next();

    if first.starts_with("#!") {
        header.shebang = Some(first.trim_end().to_string());
        header.end_byte = first.len();
        if let Some(encoding) = second.and_then(encoding_of) {
            header.encoding = Some(encoding);
            header.end_byte += second.map_or(0, str::len);
        }
        return header;
    }

    if let Some(encoding) = encoding_of(first) {
        header.encoding = Some(encoding);
        header.end_byte = first.len();
    } else if first.trim_start().starts_with('#') {
        if let Some(encoding) = second.and_then(encoding_of) {
            header.encoding = Some(encoding);
            header.end_byte = first.len() + second.map_or(0, str::len);
        }
    }
    header
}

fn encoding_of(line: &str) -> Option<String> {
    ENCODING_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

// ---------------------------------------------------------------------------
// Tree-level read and write
// ---------------------------------------------------------------------------

/// The hash recorded in the docstring of a definition or of the module.
pub fn read_recorded_tag(tree: &SyntaxTree, scope: NodeId) -> Option<String> {
    let span = docstring_span(tree, scope)?;
    parse_athena_tag(tree.source().get(span.content)?)
}

/// Rewrite an existing docstring so it carries `hash`.
fn retag_docstring(source: &str, span: &DocstringSpan, indent: &str, hash: &str) -> String {
    let content = &source[span.content.clone()];

    if ATHENA_TAG_RE.is_match(content) {
        return replace_tag_hashes(source, span.content.clone(), hash);
    }

    let tag = format!("@athena: {hash}");
    let prose = content.trim_end();

    if span.triple_quoted {
        if prose.trim_start().is_empty() {
            return splice(source, span.content.clone(), &tag);
        }
        let prose_end = span.content.start + prose.len();
        let nl = line_ending(source);
        let insertion = format!("{nl}{indent}{tag}{nl}{indent}");
        return splice(source, prose_end..span.content.end, &insertion);
    }

    let quotes: String = std::iter::repeat(span.quote).take(3).collect();
    let literal = if prose.trim_start().is_empty() {
        format!("{}{quotes}{tag}{quotes}", span.prefix)
    } else {
        let nl = line_ending(source);
        format!(
            "{}{quotes}{prose}{nl}{indent}{tag}{nl}{indent}{quotes}",
            span.prefix
        )
    };
    splice(source, span.literal.clone(), &literal)
}

/// The `:` that ends a definition's header.
fn header_colon(tree: &SyntaxTree, definition: NodeId, body: NodeId) -> Option<NodeId> {
    let body_start = tree.node(body).start_byte;
    tree.children(definition)
        .iter()
        .rev()
        .copied()
        .find(|c| tree.kind(*c) == ":" && tree.node(*c).end_byte <= body_start)
}

/// Source with the docstring of a function, class or method carrying `hash`.
pub fn apply_entity_tag(tree: &SyntaxTree, definition: NodeId, hash: &str) -> AthenaResult<String> {
    let source = tree.source();
    let body = definition_body(tree, definition).ok_or_else(|| {
        AthenaError::Unsupported("definition has no body to hold a docstring".to_string())
    })?;
    let first_statement = tree.node(tree.first_statement(body).unwrap_or(body));
    let header_indent = tree.indent_of_line(tree.node(definition).start_byte);
    let nested_indent = format!("{header_indent}{BODY_INDENT}");
    let body_indent = tree
        .line_indent(first_statement.start_byte)
        .map(str::to_string)
        .unwrap_or(nested_indent);

    if let Some(span) = docstring_span(tree, definition) {
        return Ok(retag_docstring(source, &span, &body_indent, hash));
    }

    let colon = header_colon(tree, definition, body).ok_or_else(|| {
        AthenaError::Unsupported("definition header has no terminating ':'".to_string())
    })?;
    let colon_node = tree.node(colon);
    let nl = line_ending(source);
    let docstring = format!("\"\"\"@athena: {hash}\"\"\"");

    if first_statement.start_line == colon_node.end_line {
        // Inline body: move it onto its own line below the new docstring.
        let replacement = format!("{nl}{body_indent}{docstring}{nl}{body_indent}");
        return Ok(splice(
            source,
            colon_node.end_byte..first_statement.start_byte,
            &replacement,
        ));
    }

    let line_end = source[colon_node.end_byte..]
        .find('\n')
        .map_or(source.len(), |i| colon_node.end_byte + i);
    let insert_at = if line_end > 0 && source.as_bytes()[line_end - 1] == b'\r' {
        line_end - 1
    } else {
        line_end
    };
    let insertion = format!("{nl}{body_indent}{docstring}");
    Ok(splice(source, insert_at..insert_at, &insertion))
}

/// Source with the module docstring carrying `hash`.
pub fn apply_module_tag(tree: &SyntaxTree, hash: &str) -> String {
    let source = tree.source();
    if let Some(span) = docstring_span(tree, tree.root()) {
        return retag_docstring(source, &span, "", hash);
    }

    let header = detect_file_header(source);
    let nl = line_ending(source);
    let mut insertion = String::new();
    if header.end_byte > 0 && !source[..header.end_byte].ends_with('\n') {
        insertion.push_str(nl);
    }
    insertion.push_str(&format!("\"\"\"@athena: {hash}\"\"\"{nl}"));
    splice(source, header.end_byte..header.end_byte, &insertion)
}

/// Dispatch a tag write on the entity kind. `scope` is the definition node,
/// or the module root for module-level tags.
pub fn apply_tag(
    tree: &SyntaxTree,
    scope: NodeId,
    kind: EntityKind,
    hash: &str,
) -> AthenaResult<String> {
    match kind {
        EntityKind::Function | EntityKind::Class | EntityKind::Method => {
            apply_entity_tag(tree, scope, hash)
        }
        EntityKind::Module => Ok(apply_module_tag(tree, hash)),
        EntityKind::Package => Err(AthenaError::Unsupported(
            "package tags live in the package's __init__.py module docstring".to_string(),
        )),
    }
}
