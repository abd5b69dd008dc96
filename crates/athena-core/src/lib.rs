//! Athena core library: staleness tracking for Python docstrings.
//!
//! Every function, class, method, module and package gets a short content
//! fingerprint computed from its syntax tree. The fingerprint is recorded in
//! the entity's docstring as an `@athena: <hash>` line; a docstring whose
//! recorded hash differs from the freshly computed one documents code that
//! has changed since the docs were last reviewed.
//!
//! The [`indexer`] layer parses sources with tree-sitter and computes
//! hashes; the [`sync`] layer resolves entity paths, rewrites tags and
//! drives recursive runs through [`Synchronizer`].

pub mod config;
pub mod errors;
pub mod indexer;
pub mod models;
pub mod sync;

pub use config::SyncConfig;
pub use errors::{AthenaError, AthenaResult};
pub use models::{
    Entity, EntityInfo, EntityKind, InspectOutcome, InspectReport, Location, Parameter,
    Signature, SkippedMember, SyncOutcome, SyncReport,
};
pub use sync::engine::{needs_update, Synchronizer};
pub use sync::entity_path::{resolve_entity_path, EntityPath};
pub use sync::exclusion::ExclusionPolicy;
