//! Sync orchestration: resolve, hash, compare and rewrite.
//!
//! Each entity is handled with a full read-compute-write cycle on its file.
//! Recursive runs group members by file; files run in parallel on a rayon
//! pool while members of one file run in order, each re-reading the file
//! the previous member may have rewritten.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::errors::{AthenaError, AthenaResult};
use crate::indexer::filesystem::{
    get_package_manifest, init_file_path, iter_packages, iter_python_files, relative_path,
};
use crate::indexer::hashing::{compute_entity_hash, compute_module_hash, compute_package_hash};
use crate::indexer::parser::parse_source;
use crate::indexer::symbols::{extract_entities, extract_entity_info, locate, LocatedEntity};
use crate::indexer::syntax::SyntaxTree;
use crate::models::{
    EntityInfo, EntityKind, InspectOutcome, InspectReport, Location, SkippedMember, SyncOutcome,
    SyncReport,
};
use crate::sync::docstring::{apply_module_tag, apply_tag, read_recorded_tag};
use crate::sync::entity_path::{resolve_entity_path, EntityPath, PathTarget, ResolvedPath};

/// Whether a recorded tag must be rewritten.
pub fn needs_update(recorded: Option<&str>, computed: &str, force: bool) -> bool {
    force || recorded != Some(computed)
}

fn read_source(path: &Path, rel_path: &str) -> AthenaResult<String> {
    match std::fs::read_to_string(path) {
        Ok(source) => Ok(source),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(AthenaError::NotFound(rel_path.to_string()))
        }
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            Err(AthenaError::Parse(format!("{rel_path} is not valid UTF-8")))
        }
        Err(e) => Err(e.into()),
    }
}

fn locate_or_err(tree: &SyntaxTree, entity_path: &EntityPath) -> AthenaResult<LocatedEntity> {
    locate(tree, entity_path).ok_or_else(|| AthenaError::EntityNotFound {
        path: entity_path.file_path.clone(),
        name: entity_path.entity_name.clone().unwrap_or_default(),
    })
}

fn module_extent(source: &str) -> Location {
    Location {
        start: 0,
        end: source.lines().count().saturating_sub(1),
    }
}

// ---------------------------------------------------------------------------
// Recursive plans
// ---------------------------------------------------------------------------

/// One unit of a recursive run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Member {
    /// A package directory, tagged on its `__init__.py`.
    Package(PathBuf),
    /// A `file:name` entity path.
    Entity(String),
}

#[derive(Debug)]
struct PlannedMember {
    member: Member,
    /// Failures of the requested target itself are never skipped.
    required: bool,
}

/// Members keyed by the file they touch, in discovery order.
type Plan = IndexMap<PathBuf, Vec<PlannedMember>>;

pub struct Synchronizer {
    repo_root: PathBuf,
    config: SyncConfig,
}

impl Synchronizer {
    /// A synchronizer with [`SyncConfig::default`], whose exclusion policy
    /// already covers the virtual environment named by `VIRTUAL_ENV`. Use
    /// [`SyncConfig::from_env`] with [`Synchronizer::with_config`] to pick up
    /// the `ATHENA_*` overrides as well.
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self::with_config(repo_root, SyncConfig::default())
    }

    pub fn with_config(repo_root: impl Into<PathBuf>, config: SyncConfig) -> Self {
        Self {
            repo_root: repo_root.into(),
            config,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn resolve(&self, entity_path: &EntityPath) -> AthenaResult<ResolvedPath> {
        if entity_path.file_path.is_empty() {
            return Err(AthenaError::Malformed(entity_path.to_string()));
        }
        let resolved = resolve_entity_path(entity_path, &self.repo_root)
            .ok_or_else(|| AthenaError::NotFound(entity_path.file_path.clone()))?;

        match resolved.target {
            PathTarget::Namespace => {
                return Err(AthenaError::Malformed(format!(
                    "{} is a directory without __init__.py",
                    entity_path.file_path
                )));
            }
            PathTarget::Package if entity_path.has_entity() => {
                return Err(AthenaError::Malformed(format!(
                    "{entity_path} names an entity inside a directory"
                )));
            }
            _ => {}
        }

        if self
            .config
            .exclusion
            .should_exclude(&resolved.location, &self.repo_root)
        {
            return Err(AthenaError::Excluded(entity_path.file_path.clone()));
        }
        Ok(resolved)
    }

    fn load(&self, location: &Path, rel_path: &str) -> AthenaResult<SyntaxTree> {
        let source = read_source(location, rel_path)?;
        parse_source(&source)
    }

    // -----------------------------------------------------------------------
    // Single entities
    // -----------------------------------------------------------------------

    /// Bring the tag of one function, class or method in line with its code.
    pub fn sync_entity(&self, raw_path: &str, force: bool) -> AthenaResult<SyncOutcome> {
        let entity_path = EntityPath::parse(raw_path);
        let resolved = self.resolve(&entity_path)?;

        match resolved.target {
            PathTarget::Definition | PathTarget::Method => {}
            PathTarget::Module => {
                return Err(AthenaError::Unsupported(format!(
                    "module-level sync of {entity_path}; sync its entities recursively instead"
                )));
            }
            PathTarget::Package | PathTarget::Namespace => {
                return Err(AthenaError::Unsupported(format!(
                    "package-level sync of {entity_path}; sync it recursively instead"
                )));
            }
        }

        let tree = self.load(&resolved.location, &entity_path.file_path)?;
        let entity = locate_or_err(&tree, &entity_path)?;
        let computed = compute_entity_hash(&tree, &entity)?;
        let recorded = read_recorded_tag(&tree, entity.definition);

        if !needs_update(recorded.as_deref(), &computed, force) {
            debug!(entity = %entity_path, hash = %computed, "tag already current");
            return Ok(SyncOutcome {
                kind: entity.kind,
                path: entity_path.to_string(),
                updated: false,
            });
        }
        if tree.has_error() {
            return Err(AthenaError::Parse(format!(
                "{} has syntax errors; refusing to rewrite it",
                entity_path.file_path
            )));
        }

        let updated = apply_tag(&tree, entity.definition, entity.kind, &computed)?;
        std::fs::write(&resolved.location, updated)?;
        debug!(
            entity = %entity_path,
            old = recorded.as_deref().unwrap_or("none"),
            new = %computed,
            "tag rewritten"
        );

        Ok(SyncOutcome {
            kind: entity.kind,
            path: entity_path.to_string(),
            updated: true,
        })
    }

    /// Tag a package's `__init__.py` with its manifest hash.
    fn sync_package_tag(&self, package_dir: &Path, force: bool) -> AthenaResult<SyncOutcome> {
        let rel_path = relative_path(package_dir, &self.repo_root);
        let computed = compute_package_hash(&get_package_manifest(package_dir)?);
        let init_file = init_file_path(package_dir);
        let tree = self.load(&init_file, &rel_path)?;
        let recorded = read_recorded_tag(&tree, tree.root());

        let updated = needs_update(recorded.as_deref(), &computed, force);
        if updated {
            if tree.has_error() {
                return Err(AthenaError::Parse(format!(
                    "{rel_path}/__init__.py has syntax errors; refusing to rewrite it"
                )));
            }
            std::fs::write(&init_file, apply_module_tag(&tree, &computed))?;
            debug!(package = rel_path.as_str(), new = %computed, "package tag rewritten");
        }

        Ok(SyncOutcome {
            kind: EntityKind::Package,
            path: rel_path,
            updated,
        })
    }

    /// Report recorded and computed hashes without writing anything.
    ///
    /// Besides functions, classes and methods this accepts whole modules
    /// (tag in the module docstring) and packages (tag in `__init__.py`).
    pub fn inspect_entity(&self, raw_path: &str) -> AthenaResult<InspectOutcome> {
        let entity_path = EntityPath::parse(raw_path);
        let resolved = self.resolve(&entity_path)?;

        match resolved.target {
            PathTarget::Package | PathTarget::Namespace => self.inspect_package(&resolved.location),
            PathTarget::Module => {
                let source = read_source(&resolved.location, &entity_path.file_path)?;
                let tree = parse_source(&source)?;
                Ok(InspectOutcome {
                    kind: EntityKind::Module,
                    path: entity_path.to_string(),
                    extent: module_extent(&source),
                    recorded_hash: read_recorded_tag(&tree, tree.root()),
                    calculated_hash: compute_module_hash(&tree),
                })
            }
            PathTarget::Definition | PathTarget::Method => {
                let tree = self.load(&resolved.location, &entity_path.file_path)?;
                let entity = locate_or_err(&tree, &entity_path)?;
                Ok(InspectOutcome {
                    kind: entity.kind,
                    path: entity_path.to_string(),
                    extent: entity.location(&tree),
                    recorded_hash: read_recorded_tag(&tree, entity.definition),
                    calculated_hash: compute_entity_hash(&tree, &entity)?,
                })
            }
        }
    }

    /// Signature, extent and docstring of a function, class, method or
    /// module. Packages have no single source to describe.
    pub fn entity_info(&self, raw_path: &str) -> AthenaResult<EntityInfo> {
        let entity_path = EntityPath::parse(raw_path);
        let resolved = self.resolve(&entity_path)?;
        if matches!(resolved.target, PathTarget::Package | PathTarget::Namespace) {
            return Err(AthenaError::Unsupported(format!(
                "entity info for directory {entity_path}"
            )));
        }

        let tree = self.load(&resolved.location, &entity_path.file_path)?;
        extract_entity_info(&tree, &entity_path).ok_or_else(|| AthenaError::EntityNotFound {
            path: entity_path.file_path.clone(),
            name: entity_path.entity_name.clone().unwrap_or_default(),
        })
    }

    fn inspect_package(&self, package_dir: &Path) -> AthenaResult<InspectOutcome> {
        let rel_path = relative_path(package_dir, &self.repo_root);
        let source = read_source(&init_file_path(package_dir), &rel_path)?;
        let tree = parse_source(&source)?;
        Ok(InspectOutcome {
            kind: EntityKind::Package,
            path: rel_path,
            extent: module_extent(&source),
            recorded_hash: read_recorded_tag(&tree, tree.root()),
            calculated_hash: compute_package_hash(&get_package_manifest(package_dir)?),
        })
    }

    // -----------------------------------------------------------------------
    // Sub-entities
    // -----------------------------------------------------------------------

    /// `file:name` paths of every function, class and method in a file.
    fn module_members(&self, file: &Path) -> AthenaResult<Vec<String>> {
        let rel_path = relative_path(file, &self.repo_root);
        let tree = self.load(file, &rel_path)?;
        Ok(extract_entities(&tree, &rel_path)
            .iter()
            .map(|entity| entity.entity_path())
            .collect())
    }

    fn package_files(&self, package_dir: &Path) -> Vec<PathBuf> {
        iter_python_files(package_dir, &self.repo_root, &self.config.exclusion)
            .into_iter()
            .filter(|file| !self.config.exclusion.should_exclude(file, &self.repo_root))
            .collect()
    }

    /// Entities contained in a package, module or class.
    ///
    /// Packages yield every entity of every module below them (`__init__.py`
    /// excluded), modules their functions, classes and methods in file
    /// order, classes their methods. Functions and methods have none.
    pub fn collect_sub_entities(&self, raw_path: &str) -> AthenaResult<Vec<String>> {
        let entity_path = EntityPath::parse(raw_path);
        let resolved = self.resolve(&entity_path)?;

        match resolved.target {
            PathTarget::Package | PathTarget::Namespace => {
                let mut members = Vec::new();
                for file in self.package_files(&resolved.location) {
                    members.extend(self.module_members(&file)?);
                }
                Ok(members)
            }
            PathTarget::Module => self.module_members(&resolved.location),
            PathTarget::Definition => {
                let tree = self.load(&resolved.location, &entity_path.file_path)?;
                let Some(name) = entity_path.entity_name.as_deref() else {
                    return Ok(Vec::new());
                };
                let prefix = format!("{name}.");
                Ok(extract_entities(&tree, &entity_path.file_path)
                    .into_iter()
                    .filter(|e| e.kind == EntityKind::Method && e.name.starts_with(&prefix))
                    .map(|e| e.entity_path())
                    .collect())
            }
            PathTarget::Method => Ok(Vec::new()),
        }
    }

    /// Group the members of a recursive run by file.
    ///
    /// Per-file discovery failures that bulk runs tolerate are returned as
    /// skipped members rather than aborting the plan.
    fn plan(&self, raw_path: &str) -> AthenaResult<(Plan, Vec<SkippedMember>)> {
        let entity_path = EntityPath::parse(raw_path);
        let resolved = self.resolve(&entity_path)?;
        let mut plan = Plan::new();
        let mut skipped = Vec::new();

        let add = |plan: &mut Plan, file: PathBuf, member: Member, required: bool| {
            plan.entry(file)
                .or_default()
                .push(PlannedMember { member, required });
        };

        match resolved.target {
            PathTarget::Package | PathTarget::Namespace => {
                let packages =
                    iter_packages(&resolved.location, &self.repo_root, &self.config.exclusion);
                for package in packages {
                    add(&mut plan, init_file_path(&package), Member::Package(package), false);
                }
                for file in self.package_files(&resolved.location) {
                    match self.module_members(&file) {
                        Ok(members) => {
                            for member in members {
                                add(&mut plan, file.clone(), Member::Entity(member), false);
                            }
                        }
                        Err(e) if e.is_member_recoverable() => {
                            let path = relative_path(&file, &self.repo_root);
                            warn!(member = %path, error = %e, "skipping unreadable module");
                            skipped.push(SkippedMember {
                                path,
                                reason: e.to_string(),
                            });
                        }
                        Err(e) => return Err(e),
                    }
                }
            }
            PathTarget::Module => {
                for member in self.module_members(&resolved.location)? {
                    add(&mut plan, resolved.location.clone(), Member::Entity(member), false);
                }
            }
            PathTarget::Definition | PathTarget::Method => {
                let file = resolved.location.clone();
                add(&mut plan, file.clone(), Member::Entity(entity_path.to_string()), true);
                for member in self.collect_sub_entities(raw_path)? {
                    add(&mut plan, file.clone(), Member::Entity(member), false);
                }
            }
        }

        Ok((plan, skipped))
    }

    /// Run `work` over every planned member, files in parallel.
    fn execute<T, F>(&self, plan: Plan, work: F) -> Vec<(String, bool, AthenaResult<T>)>
    where
        T: Send,
        F: Fn(&Member) -> AthenaResult<T> + Sync,
    {
        let jobs: Vec<Vec<PlannedMember>> = plan.into_values().collect();
        let run_file = |members: &Vec<PlannedMember>| -> Vec<(String, bool, AthenaResult<T>)> {
            members
                .iter()
                .map(|planned| {
                    let label = match &planned.member {
                        Member::Package(dir) => relative_path(dir, &self.repo_root),
                        Member::Entity(path) => path.clone(),
                    };
                    (label, planned.required, work(&planned.member))
                })
                .collect()
        };

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.workers.max(1))
            .build();

        let per_file: Vec<Vec<(String, bool, AthenaResult<T>)>> = match pool {
            Ok(pool) => pool.install(|| jobs.par_iter().map(run_file).collect()),
            Err(e) => {
                warn!(error = %e, "thread pool unavailable; running sequentially");
                jobs.iter().map(run_file).collect()
            }
        };
        per_file.into_iter().flatten().collect()
    }

    // -----------------------------------------------------------------------
    // Recursive runs
    // -----------------------------------------------------------------------

    /// Sync an entity and everything below it.
    ///
    /// Packages tag every package directory in the tree and sync the
    /// entities of their modules. Modules sync their entities (the module
    /// itself carries no tag). Classes sync themselves and their methods.
    /// Members that vanished or fail to parse are skipped and reported.
    pub fn sync_recursive(&self, raw_path: &str, force: bool) -> AthenaResult<SyncReport> {
        let (plan, skipped) = self.plan(raw_path)?;
        let results = self.execute(plan, |member| match member {
            Member::Package(dir) => self.sync_package_tag(dir, force),
            Member::Entity(path) => self.sync_entity(path, force),
        });

        let mut report = SyncReport {
            skipped,
            ..SyncReport::default()
        };
        let mut failure = None;
        for (label, required, result) in results {
            match result {
                Ok(outcome) => report.record(outcome),
                Err(e) if !required && e.is_member_recoverable() => {
                    warn!(member = %label, error = %e, "skipping member");
                    report.skipped.push(SkippedMember {
                        path: label,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    failure.get_or_insert(e);
                }
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }

        info!(
            entity = raw_path,
            members = report.outcomes.len(),
            updated = report.updated,
            skipped = report.skipped.len(),
            "recursive sync finished"
        );
        Ok(report)
    }

    /// Read-only counterpart of [`Synchronizer::sync_recursive`].
    pub fn inspect_recursive(&self, raw_path: &str) -> AthenaResult<InspectReport> {
        let (plan, skipped) = self.plan(raw_path)?;
        let results = self.execute(plan, |member| match member {
            Member::Package(dir) => self.inspect_package(dir),
            Member::Entity(path) => self.inspect_entity(path),
        });

        let mut report = InspectReport {
            skipped,
            ..InspectReport::default()
        };
        for (label, required, result) in results {
            match result {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) if !required && e.is_member_recoverable() => {
                    warn!(member = %label, error = %e, "skipping member");
                    report.skipped.push(SkippedMember {
                        path: label,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            entity = raw_path,
            members = report.outcomes.len(),
            stale = report.stale().count(),
            "recursive inspect finished"
        );
        Ok(report)
    }
}
