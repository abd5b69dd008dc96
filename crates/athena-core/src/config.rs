//! Runtime configuration for sync runs.

use std::path::PathBuf;

use crate::sync::exclusion::ExclusionPolicy;

pub const DEFAULT_SYNC_WORKERS: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    pub exclusion: ExclusionPolicy,
    /// Files processed in parallel by recursive runs.
    pub workers: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            exclusion: ExclusionPolicy::default(),
            workers: DEFAULT_SYNC_WORKERS,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(val) => {
            let v = val.trim().to_lowercase();
            !matches!(v.as_str(), "0" | "false" | "no" | "off")
        }
        Err(_) => default,
    }
}

impl SyncConfig {
    /// Defaults overridden by `ATHENA_*` environment variables.
    ///
    /// * `ATHENA_SYNC_WORKERS`: worker threads, at least 1.
    /// * `ATHENA_EXCLUDE_DIRS`: extra directory names to skip, comma separated.
    /// * `ATHENA_SELF_EXCLUDE`: `0`, `false`, `no` or `off` allows tagging
    ///   athena's own sources.
    /// * `ATHENA_INTERPRETER_PREFIX`: an interpreter prefix on top of the
    ///   `VIRTUAL_ENV` one [`ExclusionPolicy::default`] already carries.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(workers) = std::env::var("ATHENA_SYNC_WORKERS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            config.workers = workers.max(1);
        }

        if let Ok(dirs) = std::env::var("ATHENA_EXCLUDE_DIRS") {
            config.exclusion.venv_dirs.extend(
                dirs.split(',')
                    .map(str::trim)
                    .filter(|d| !d.is_empty())
                    .map(str::to_string),
            );
        }

        if !env_flag("ATHENA_SELF_EXCLUDE", true) {
            config.exclusion.tool_roots.clear();
            config.exclusion.exclude_tool_package = false;
        }

        if let Ok(prefix) = std::env::var("ATHENA_INTERPRETER_PREFIX") {
            let prefix = PathBuf::from(prefix.trim());
            if !prefix.as_os_str().is_empty()
                && !config.exclusion.interpreter_prefixes.contains(&prefix)
            {
                config.exclusion.interpreter_prefixes.push(prefix);
            }
        }

        config
    }
}
