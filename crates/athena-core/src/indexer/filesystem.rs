//! Filesystem helpers for package discovery and source traversal.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::errors::AthenaResult;
use crate::indexer::parser::PYTHON_EXTENSION;
use crate::sync::exclusion::ExclusionPolicy;

pub const INIT_FILE: &str = "__init__.py";

const IMPLICIT_IGNORED_DIRS: &[&str] = &["__pycache__", ".git"];

/// A regular package: a directory holding `__init__.py`.
pub fn is_package(dir: &Path) -> bool {
    dir.is_dir() && dir.join(INIT_FILE).is_file()
}

pub fn init_file_path(package_dir: &Path) -> PathBuf {
    package_dir.join(INIT_FILE)
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

fn is_python_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(PYTHON_EXTENSION)
}

/// Sorted names of a package's immediate children that make up its
/// structure: `.py` files other than `__init__.py`, and sub-package
/// directories. Hidden entries, `__pycache__` and namespace directories are
/// left out.
pub fn get_package_manifest(package_dir: &Path) -> AthenaResult<Vec<String>> {
    let mut manifest = Vec::new();

    for entry in std::fs::read_dir(package_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if is_hidden(&name) || IMPLICIT_IGNORED_DIRS.contains(&name.as_str()) {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            if is_package(&path) {
                manifest.push(name);
            }
        } else if name != INIT_FILE && is_python_file(&path) {
            manifest.push(name);
        }
    }

    manifest.sort();
    Ok(manifest)
}

/// Walk `dir`, pruning hidden, cache and excluded directories.
fn walk<'a>(
    dir: &'a Path,
    repo_root: &'a Path,
    exclusion: &'a ExclusionPolicy,
) -> impl Iterator<Item = DirEntry> + 'a {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            if is_hidden(&name) {
                return false;
            }
            if entry.file_type().is_dir() {
                if IMPLICIT_IGNORED_DIRS.contains(&name.as_ref()) {
                    return false;
                }
                return !exclusion.should_exclude(entry.path(), repo_root);
            }
            true
        })
        .filter_map(Result::ok)
}

/// Every `.py` file below `dir` except `__init__.py`, in sorted order.
pub fn iter_python_files(
    dir: &Path,
    repo_root: &Path,
    exclusion: &ExclusionPolicy,
) -> Vec<PathBuf> {
    walk(dir, repo_root, exclusion)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name() != INIT_FILE && is_python_file(entry.path()))
        .map(DirEntry::into_path)
        .collect()
}

/// `dir` itself (when it is a package) and every regular package below it.
///
/// Descent continues through namespace directories, so a package nested in
/// one is still found.
pub fn iter_packages(dir: &Path, repo_root: &Path, exclusion: &ExclusionPolicy) -> Vec<PathBuf> {
    walk(dir, repo_root, exclusion)
        .filter(|entry| entry.file_type().is_dir() && is_package(entry.path()))
        .map(DirEntry::into_path)
        .collect()
}

/// `path` relative to `repo_root`, `/`-separated.
pub fn relative_path(path: &Path, repo_root: &Path) -> String {
    path.strip_prefix(repo_root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "pkg/__init__.py", "");
        write(root, "pkg/a.py", "");
        write(root, "pkg/b.py", "");
        write(root, "pkg/notes.txt", "");
        write(root, "pkg/.hidden.py", "");
        write(root, "pkg/__pycache__/a.cpython-312.pyc", "");
        write(root, "pkg/sub/__init__.py", "");
        write(root, "pkg/sub/c.py", "");
        write(root, "pkg/ns/d.py", "");
        write(root, "pkg/ns/inner/__init__.py", "");
        write(root, "pkg/.venv/lib/e.py", "");
        dir
    }

    #[test]
    fn test_package_manifest() {
        let dir = fixture();
        let manifest = get_package_manifest(&dir.path().join("pkg")).unwrap();
        assert_eq!(manifest, vec!["a.py", "b.py", "sub"]);
    }

    #[test]
    fn test_manifest_of_missing_dir_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(get_package_manifest(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_is_package() {
        let dir = fixture();
        assert!(is_package(&dir.path().join("pkg")));
        assert!(is_package(&dir.path().join("pkg/sub")));
        assert!(!is_package(&dir.path().join("pkg/ns")));
        assert!(!is_package(&dir.path().join("pkg/a.py")));
    }

    #[test]
    fn test_iter_python_files_prunes() {
        let dir = fixture();
        let root = dir.path();
        let files: Vec<String> =
            iter_python_files(&root.join("pkg"), root, &ExclusionPolicy::default())
                .iter()
                .map(|p| relative_path(p, root))
                .collect();
        assert_eq!(files, vec!["pkg/a.py", "pkg/b.py", "pkg/ns/d.py", "pkg/sub/c.py"]);
    }

    #[test]
    fn test_iter_python_files_without_exclusion_still_skips_hidden() {
        let dir = fixture();
        let root = dir.path();
        let files = iter_python_files(&root.join("pkg"), root, &ExclusionPolicy::none());
        assert!(files.iter().all(|p| !p.to_string_lossy().contains(".venv")));
    }

    #[test]
    fn test_iter_packages() {
        let dir = fixture();
        let root = dir.path();
        let packages: Vec<String> =
            iter_packages(&root.join("pkg"), root, &ExclusionPolicy::default())
                .iter()
                .map(|p| relative_path(p, root))
                .collect();
        assert_eq!(packages, vec!["pkg", "pkg/ns/inner", "pkg/sub"]);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(Path::new("/repo/a/b.py"), root), "a/b.py");
        assert_eq!(relative_path(Path::new("/elsewhere/x.py"), root), "/elsewhere/x.py");
    }
}
