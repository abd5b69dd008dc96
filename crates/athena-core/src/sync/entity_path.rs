//! Entity path grammar: `<repo-relative-path>[:<Name>[.<member>]]`.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::indexer::filesystem::INIT_FILE;

/// A parsed entity reference. Parsing never fails; anything after the first
/// `:` that is empty means "the file or directory itself".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityPath {
    pub file_path: String,
    /// Bare name, or the full `Class.method` for dotted references.
    pub entity_name: Option<String>,
    pub class_name: Option<String>,
    pub method_name: Option<String>,
}

impl EntityPath {
    pub fn parse(raw: &str) -> Self {
        let (file_path, entity) = match raw.split_once(':') {
            Some((file_path, entity)) => (file_path, entity.trim()),
            None => (raw, ""),
        };
        let file_path = file_path.trim().to_string();

        if entity.is_empty() {
            return Self {
                file_path,
                ..Self::default()
            };
        }

        let (class_name, method_name) = match entity.split_once('.') {
            Some((class_name, method_name)) => {
                (Some(class_name.to_string()), Some(method_name.to_string()))
            }
            None => (None, None),
        };

        Self {
            file_path,
            entity_name: Some(entity.to_string()),
            class_name,
            method_name,
        }
    }

    pub fn has_entity(&self) -> bool {
        self.entity_name.is_some()
    }

    pub fn is_method(&self) -> bool {
        self.class_name.is_some() && self.method_name.is_some()
    }

    /// A reference to a whole `.py` file under `root`.
    pub fn is_module(&self, root: &Path) -> bool {
        !self.has_entity() && root.join(&self.file_path).is_file()
    }

    /// A reference to a regular package (a directory with `__init__.py`).
    pub fn is_package(&self, root: &Path) -> bool {
        !self.has_entity() && root.join(&self.file_path).join(INIT_FILE).is_file()
    }

    /// The path string of a member of this file, e.g. `a.py:Class.method`.
    pub fn member(&self, name: &str) -> String {
        format!("{}:{name}", self.file_path)
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entity_name {
            Some(name) => write!(f, "{}:{name}", self.file_path),
            None => f.write_str(&self.file_path),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// What a resolved path points at on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathTarget {
    /// Directory containing `__init__.py`.
    Package,
    /// Directory without `__init__.py`; never treated as a package.
    Namespace,
    /// A whole source file.
    Module,
    /// A top-level function or class inside a file.
    Definition,
    /// A method inside a class.
    Method,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Absolute location: the directory for packages, otherwise the file.
    pub location: PathBuf,
    pub target: PathTarget,
}

/// Join the entity path to `root` and classify it.
///
/// Returns `None` when nothing exists at the path. Entity names under a
/// directory still resolve (to a `Package` or `Namespace` target); callers
/// reject those as malformed.
pub fn resolve_entity_path(entity_path: &EntityPath, root: &Path) -> Option<ResolvedPath> {
    let location = root.join(&entity_path.file_path);

    let target = if location.is_dir() {
        if location.join(INIT_FILE).is_file() {
            PathTarget::Package
        } else {
            PathTarget::Namespace
        }
    } else if location.is_file() {
        if entity_path.is_method() {
            PathTarget::Method
        } else if entity_path.has_entity() {
            PathTarget::Definition
        } else {
            PathTarget::Module
        }
    } else {
        return None;
    };

    Some(ResolvedPath { location, target })
}
