//! End-to-end sync runs over realistic module and package layouts.

use std::path::Path;

use athena_core::indexer::hashing::HASH_LENGTH;
use athena_core::sync::docstring::{parse_athena_tag, ATHENA_TAG_RE};
use athena_core::{AthenaError, EntityKind, ExclusionPolicy, SyncConfig, Synchronizer};
use tempfile::TempDir;

const CALCULATOR: &str = r#""""Calculator module for basic math operations."""


class Calculator:
    """A simple calculator class."""

    def __init__(self):
        self.result = 0

    def add(self, x: int, y: int) -> int:
        """Add two numbers."""
        return x + y

    def subtract(self, x: int, y: int) -> int:
        """Subtract y from x."""
        return x - y

    def multiply(self, x: int, y: int) -> int:
        """Multiply two numbers."""
        return x * y

    def divide(self, x: float, y: float) -> float:
        """Divide x by y."""
        if y == 0:
            raise ValueError("Cannot divide by zero")
        return x / y


def create_calculator() -> Calculator:
    """Factory function to create a calculator."""
    return Calculator()
"#;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn read(root: &Path, rel: &str) -> String {
    std::fs::read_to_string(root.join(rel)).unwrap()
}

fn tags(source: &str) -> Vec<String> {
    ATHENA_TAG_RE
        .captures_iter(source)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn synchronizer(root: &Path) -> Synchronizer {
    Synchronizer::with_config(
        root,
        SyncConfig {
            exclusion: ExclusionPolicy::none(),
            ..SyncConfig::default()
        },
    )
}

#[test]
fn test_sync_realistic_module() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "calculator.py", CALCULATOR);
    let sync = synchronizer(root);

    let report = sync.sync_recursive("calculator.py", false).unwrap();
    assert_eq!(report.updated, 7);
    assert_eq!(report.exit_code(), 1);
    assert!(report.skipped.is_empty());

    let updated = read(root, "calculator.py");
    let found = tags(&updated);
    assert_eq!(found.len(), 7);
    assert!(found.iter().all(|t| t.len() == HASH_LENGTH));

    // Prose and the module docstring survive untouched.
    assert!(updated.starts_with("\"\"\"Calculator module for basic math operations.\"\"\"\n"));
    assert!(updated.contains("\"\"\"Divide x by y.\n        @athena: "));
    assert!(updated.contains("raise ValueError(\"Cannot divide by zero\")"));

    let again = sync.sync_recursive("calculator.py", false).unwrap();
    assert_eq!(again.updated, 0);
    assert_eq!(again.exit_code(), 0);
    assert_eq!(read(root, "calculator.py"), updated);
}

#[test]
fn test_sync_detects_code_change() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "test.py", "def compute(x):\n    return x * 2\n");
    let sync = synchronizer(root);

    sync.sync_entity("test.py:compute", false).unwrap();
    let first = parse_athena_tag(&read(root, "test.py")).unwrap();

    let edited = read(root, "test.py").replace("x * 2", "x * 3");
    write(root, "test.py", &edited);
    let outcome = sync.sync_entity("test.py:compute", false).unwrap();
    assert!(outcome.updated);

    let second = parse_athena_tag(&read(root, "test.py")).unwrap();
    assert_ne!(first, second);
    assert_eq!(tags(&read(root, "test.py")).len(), 1);
}

#[test]
fn test_calculate_operator_change_scenario() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "calc.py", "def calculate(x, y):\n    return x + y\n");
    let sync = synchronizer(root);

    sync.sync_entity("calc.py:calculate", false).unwrap();
    let tagged = read(root, "calc.py");
    let hash_plus = parse_athena_tag(&tagged).unwrap();

    write(root, "calc.py", &tagged.replace("x + y", "x * y"));
    let stale = sync.inspect_entity("calc.py:calculate").unwrap();
    assert_eq!(stale.recorded_hash.as_deref(), Some(hash_plus.as_str()));
    assert_ne!(stale.calculated_hash, hash_plus);
    assert!(!stale.is_in_sync());

    assert!(sync.sync_entity("calc.py:calculate", false).unwrap().updated);
    let fresh = sync.inspect_entity("calc.py:calculate").unwrap();
    assert!(fresh.is_in_sync());
    assert_eq!(fresh.recorded_hash, Some(stale.calculated_hash));
}

#[test]
fn test_existing_docstring_content_preserved() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let source = "def process(data):\n    \"\"\"Process the input data.\n\n    Args:\n        data: Input to process\n\n    Returns:\n        Processed result\n    \"\"\"\n    return data.strip()\n";
    write(root, "proc.py", source);

    synchronizer(root).sync_entity("proc.py:process", false).unwrap();
    let updated = read(root, "proc.py");
    assert!(updated.contains("Args:\n        data: Input to process\n\n    Returns:\n        Processed result\n    @athena: "));
    assert!(updated.ends_with("\n    \"\"\"\n    return data.strip()\n"));
}

#[test]
fn test_package_sync_tags_every_package() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "mathlib/__init__.py", "\"\"\"Math library package.\"\"\"");
    write(root, "mathlib/arithmetic.py", "def add(a, b):\n    return a + b\n\n\ndef subtract(a, b):\n    return a - b\n");
    write(root, "mathlib/geometry/__init__.py", "from .shapes import Circle\n");
    write(
        root,
        "mathlib/geometry/shapes.py",
        "import math\n\n\nclass Circle:\n    def __init__(self, radius):\n        self.radius = radius\n\n    def area(self):\n        return math.pi * self.radius ** 2\n",
    );
    let sync = synchronizer(root);

    let report = sync.sync_recursive("mathlib", false).unwrap();
    let packages: Vec<&str> = report
        .outcomes
        .iter()
        .filter(|o| o.kind == EntityKind::Package)
        .map(|o| o.path.as_str())
        .collect();
    assert_eq!(packages, vec!["mathlib", "mathlib/geometry"]);
    // 2 packages, 2 functions, 1 class and 2 methods.
    assert_eq!(report.updated, 7);

    let init = read(root, "mathlib/__init__.py");
    assert!(init.starts_with("\"\"\"Math library package.\n@athena: "));
    let nested = read(root, "mathlib/geometry/__init__.py");
    assert!(nested.starts_with("\"\"\"@athena: "));
    assert!(nested.ends_with("\"\"\"\nfrom .shapes import Circle\n"));
    assert_eq!(tags(&read(root, "mathlib/arithmetic.py")).len(), 2);
    assert_eq!(tags(&read(root, "mathlib/geometry/shapes.py")).len(), 3);

    let again = sync.sync_recursive("mathlib", false).unwrap();
    assert_eq!(again.updated, 0);
}

#[test]
fn test_package_hash_is_structural() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "pkg/__init__.py", "");
    write(root, "pkg/a.py", "def f():\n    return 1\n");
    let sync = synchronizer(root);

    let original = sync.inspect_entity("pkg").unwrap().calculated_hash;

    write(root, "pkg/a.py", "def f():\n    return 2\n");
    assert_eq!(sync.inspect_entity("pkg").unwrap().calculated_hash, original);

    write(root, "pkg/b.py", "");
    let added = sync.inspect_entity("pkg").unwrap().calculated_hash;
    assert_ne!(added, original);

    std::fs::remove_file(root.join("pkg/b.py")).unwrap();
    assert_eq!(sync.inspect_entity("pkg").unwrap().calculated_hash, original);

    // Namespace sub-directories and caches do not count.
    write(root, "pkg/ns/c.py", "");
    write(root, "pkg/__pycache__/a.cpython-312.pyc", "");
    assert_eq!(sync.inspect_entity("pkg").unwrap().calculated_hash, original);

    // A regular sub-package does.
    write(root, "pkg/ns/__init__.py", "");
    assert_ne!(sync.inspect_entity("pkg").unwrap().calculated_hash, original);
}

#[test]
fn test_namespace_directories_never_get_init() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "pkg/__init__.py", "");
    write(root, "pkg/ns/mod.py", "def f():\n    pass\n");
    let sync = synchronizer(root);

    assert!(matches!(
        sync.sync_recursive("pkg/ns", false),
        Err(AthenaError::Malformed(_))
    ));

    let report = sync.sync_recursive("pkg", false).unwrap();
    assert!(report.outcomes.iter().any(|o| o.path == "pkg/ns/mod.py:f"));
    assert!(!root.join("pkg/ns/__init__.py").exists());
}

#[test]
fn test_virtualenv_is_skipped_by_recursive_sync() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let vendored = "def vendored():\n    pass\n";
    write(root, "app/__init__.py", "");
    write(root, "app/main.py", "def main():\n    pass\n");
    write(root, "app/.venv/lib/python3.12/site-packages/dep/__init__.py", "");
    write(root, "app/.venv/lib/python3.12/site-packages/dep/core.py", vendored);
    write(root, "app/venv/lib/tool.py", vendored);
    let sync = Synchronizer::with_config(root, SyncConfig::default());

    let report = sync.sync_recursive("app", false).unwrap();
    let paths: Vec<&str> = report.outcomes.iter().map(|o| o.path.as_str()).collect();
    assert_eq!(paths, vec!["app", "app/main.py:main"]);
    assert_eq!(
        read(root, "app/.venv/lib/python3.12/site-packages/dep/core.py"),
        vendored
    );
    assert_eq!(read(root, "app/venv/lib/tool.py"), vendored);

    assert!(matches!(
        sync.sync_entity("app/venv/lib/tool.py:vendored", false),
        Err(AthenaError::Excluded(_))
    ));
}

#[test]
fn test_tool_sources_are_refused() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    let source = "def main():\n    pass\n";
    write(root, "src/athena/cli.py", source);
    let sync = Synchronizer::new(root);

    let err = sync.inspect_entity("src/athena/cli.py:main").unwrap_err();
    assert!(err.to_string().starts_with("Cannot inspect excluded path"));
    assert!(sync.sync_recursive("src/athena/cli.py", false).is_err());
    assert_eq!(read(root, "src/athena/cli.py"), source);
}

#[test]
fn test_inspect_round_trip_over_module() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "calculator.py", CALCULATOR);
    let sync = synchronizer(root);

    let before = sync.inspect_recursive("calculator.py").unwrap();
    assert_eq!(before.outcomes.len(), 7);
    assert_eq!(before.stale().count(), 7);

    sync.sync_recursive("calculator.py", false).unwrap();
    let after = sync.inspect_recursive("calculator.py").unwrap();
    assert_eq!(after.stale().count(), 0);
    for (old, new) in before.outcomes.iter().zip(&after.outcomes) {
        assert_eq!(old.path, new.path);
        assert_eq!(old.calculated_hash, new.calculated_hash);
    }

    let json: serde_json::Value =
        serde_json::from_str(&after.to_json().unwrap()).unwrap();
    assert_eq!(json["outcomes"][0]["path"], "calculator.py:Calculator");
    assert_eq!(json["outcomes"][0]["kind"], "class");
}

#[test]
fn test_force_rewrites_identical_hash() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "test.py", "def func():\n    return 42\n");
    let sync = synchronizer(root);

    assert!(sync.sync_entity("test.py:func", false).unwrap().updated);
    let tagged = read(root, "test.py");
    let report = sync.sync_recursive("test.py:func", true).unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(read(root, "test.py"), tagged);
}

#[test]
fn test_shebang_and_encoding_preserved_by_package_tag() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "tool/__init__.py",
        "#!/usr/bin/env python\n# -*- coding: utf-8 -*-\nVERSION = \"1.0\"\n",
    );
    write(root, "tool/run.py", "def run():\n    pass\n");

    synchronizer(root).sync_recursive("tool", false).unwrap();
    let init = read(root, "tool/__init__.py");
    assert!(init.starts_with("#!/usr/bin/env python\n# -*- coding: utf-8 -*-\n\"\"\"@athena: "));
    assert!(init.ends_with("\"\"\"\nVERSION = \"1.0\"\n"));
}
