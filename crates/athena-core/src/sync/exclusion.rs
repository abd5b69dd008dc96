//! Paths athena refuses to inspect or rewrite.
//!
//! Third-party code (virtual environments, installed site-packages, the
//! running interpreter's prefix) and athena's own sources are never tagged.

use std::path::{Component, Path, PathBuf};

pub const DEFAULT_VENV_DIRS: &[&str] = &[
    ".venv",
    "venv",
    "env",
    ".env",
    "virtualenv",
    ".virtualenv",
    ".tox",
    ".nox",
    "__pypackages__",
];

pub const INSTALLED_PACKAGE_DIRS: &[&str] = &["site-packages", "dist-packages"];

/// Name of the tool's own Python package.
pub const TOOL_PACKAGE: &str = "athena";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPolicy {
    /// Directory names rejected wherever they appear as a path segment.
    pub venv_dirs: Vec<String>,
    /// Absolute prefixes of Python installations.
    pub interpreter_prefixes: Vec<PathBuf>,
    /// Absolute roots of the tool's own sources.
    pub tool_roots: Vec<PathBuf>,
    /// Reject repo-relative `athena/` and `src/athena/` trees.
    pub exclude_tool_package: bool,
}

/// Prefix of the active virtual environment, from `VIRTUAL_ENV`.
fn active_interpreter_prefix() -> Option<PathBuf> {
    let prefix = std::env::var("VIRTUAL_ENV").ok()?;
    let prefix = prefix.trim();
    (!prefix.is_empty()).then(|| PathBuf::from(prefix))
}

impl Default for ExclusionPolicy {
    /// Built-in venv names, the tool's own sources, and the active virtual
    /// environment's prefix when `VIRTUAL_ENV` is set.
    fn default() -> Self {
        Self {
            venv_dirs: DEFAULT_VENV_DIRS.iter().map(|d| d.to_string()).collect(),
            interpreter_prefixes: active_interpreter_prefix().into_iter().collect(),
            tool_roots: vec![PathBuf::from(env!("CARGO_MANIFEST_DIR"))],
            exclude_tool_package: true,
        }
    }
}

fn normal_segments(path: &Path) -> Vec<&str> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect()
}

impl ExclusionPolicy {
    /// A policy that excludes nothing.
    pub fn none() -> Self {
        Self {
            venv_dirs: Vec::new(),
            interpreter_prefixes: Vec::new(),
            tool_roots: Vec::new(),
            exclude_tool_package: false,
        }
    }

    /// Whether `path` (absolute or relative to `root`) must be left alone.
    ///
    /// Venv and installed-package names are matched against every segment
    /// of the absolute path, so a repository checked out inside an
    /// environment's `site-packages` is refused as a whole.
    pub fn should_exclude(&self, path: &Path, root: &Path) -> bool {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let canonical = absolute.canonicalize().unwrap_or_else(|_| absolute.clone());

        let is_third_party = |candidate: &Path| {
            normal_segments(candidate).iter().any(|s| {
                self.venv_dirs.iter().any(|d| d == s) || INSTALLED_PACKAGE_DIRS.contains(s)
            })
        };
        if is_third_party(&absolute) || is_third_party(&canonical) {
            return true;
        }

        if self.exclude_tool_package {
            if let Ok(scoped) = absolute.strip_prefix(root) {
                let is_tool_package = match normal_segments(scoped).as_slice() {
                    [first, ..] if *first == TOOL_PACKAGE => true,
                    ["src", second, ..] if *second == TOOL_PACKAGE => true,
                    _ => false,
                };
                if is_tool_package {
                    return true;
                }
            }
        }

        self.interpreter_prefixes
            .iter()
            .chain(self.tool_roots.iter())
            .any(|prefix| {
                let prefix = prefix.canonicalize().unwrap_or_else(|_| prefix.clone());
                canonical.starts_with(prefix)
            })
    }
}
