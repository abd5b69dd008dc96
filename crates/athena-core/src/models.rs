//! Shared typed models used across parsing, hashing, and sync layers.

use std::fmt;

use serde::Serialize;

use crate::errors::AthenaResult;

// ---------------------------------------------------------------------------
// Entity kinds
// ---------------------------------------------------------------------------

/// The documentable unit an entity path resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Function,
    Class,
    Method,
    Module,
    Package,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Class => "class",
            EntityKind::Method => "method",
            EntityKind::Module => "module",
            EntityKind::Package => "package",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Locations and extracted entities
// ---------------------------------------------------------------------------

/// A line range in a source file (0-indexed, inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// A function, class, or method definition found in a file.
///
/// `name` is qualified for methods (`Class.method`), so it can be appended
/// to a file path to form an entity path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub kind: EntityKind,
    pub path: String,
    pub name: String,
    pub extent: Location,
}

impl Entity {
    /// The `file:name` entity path string for this definition.
    pub fn entity_path(&self) -> String {
        format!("{}:{}", self.path, self.name)
    }
}

// ---------------------------------------------------------------------------
// Entity details
// ---------------------------------------------------------------------------

/// One parameter of a function signature. Splat parameters keep their `*`
/// or `**` in `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub annotation: Option<String>,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub name: String,
    pub args: Vec<Parameter>,
    pub return_type: Option<String>,
}

/// Descriptive view of one entity: where it is, how it is called and what
/// its docstring says.
///
/// Functions and methods carry a signature; classes and modules do not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    pub kind: EntityKind,
    pub path: String,
    pub extent: Location,
    pub sig: Option<Signature>,
    pub summary: Option<String>,
}

impl EntityInfo {
    pub fn to_json(&self) -> AthenaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// Per-entity outcomes
// ---------------------------------------------------------------------------

/// Result of a mutating sync of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub kind: EntityKind,
    pub path: String,
    pub updated: bool,
}

/// Result of a read-only inspection of one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectOutcome {
    pub kind: EntityKind,
    pub path: String,
    pub extent: Location,
    pub recorded_hash: Option<String>,
    pub calculated_hash: String,
}

impl InspectOutcome {
    pub fn is_in_sync(&self) -> bool {
        self.recorded_hash.as_deref() == Some(self.calculated_hash.as_str())
    }
}

// ---------------------------------------------------------------------------
// Bulk reports
// ---------------------------------------------------------------------------

/// A member of a bulk run that failed and was passed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMember {
    pub path: String,
    pub reason: String,
}

/// Aggregate result of `sync_recursive`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub outcomes: Vec<SyncOutcome>,
    pub updated: usize,
    pub skipped: Vec<SkippedMember>,
}

impl SyncReport {
    pub(crate) fn record(&mut self, outcome: SyncOutcome) {
        if outcome.updated {
            self.updated += 1;
        }
        self.outcomes.push(outcome);
    }

    /// Process exit code: `0` when nothing changed, `1` when at least one
    /// entity was rewritten. Callers report errors with `2`.
    pub fn exit_code(&self) -> i32 {
        if self.updated == 0 {
            0
        } else {
            1
        }
    }

    pub fn to_json(&self) -> AthenaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Aggregate result of `inspect_recursive`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct InspectReport {
    pub outcomes: Vec<InspectOutcome>,
    pub skipped: Vec<SkippedMember>,
}

impl InspectReport {
    /// Entities whose recorded tag is missing or differs from the code.
    pub fn stale(&self) -> impl Iterator<Item = &InspectOutcome> {
        self.outcomes.iter().filter(|o| !o.is_in_sync())
    }

    pub fn to_json(&self) -> AthenaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
