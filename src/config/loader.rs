//! Loader scheduler configuration.

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Hard upper bound on the number of loader worker threads.
pub const MAX_LOADER_THREADS: usize = 8;

const DEFAULT_STACK_SIZE: usize = 2 * 1024 * 1024;
const DEFAULT_THREAD_PREFIX: &str = "loader-worker";

/// What a failed dependency does to the job that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPolicy {
    /// A failed child marks the parent as failed with `LoadError::Dependency`.
    #[default]
    Propagate,
    /// The parent's success reflects only its own load and commit.
    Isolate,
}

impl FromStr for DependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(Self::Propagate),
            "isolate" => Ok(Self::Isolate),
            other => Err(format!("unknown dependency policy `{other}`")),
        }
    }
}

/// Configuration for a [`Scheduler`](crate::core::Scheduler).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Number of background worker threads (clamped to [`MAX_LOADER_THREADS`]).
    pub worker_count: usize,
    /// Stack size for each worker thread, in bytes.
    pub thread_stack_size: usize,
    /// Worker threads are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Failure propagation from dependencies to their parents.
    pub dependency_policy: DependencyPolicy,
    /// Root directory for the default directory-backed asset source.
    pub asset_root: Option<PathBuf>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            worker_count: 1,
            thread_stack_size: DEFAULT_STACK_SIZE,
            thread_name_prefix: DEFAULT_THREAD_PREFIX.to_owned(),
            dependency_policy: DependencyPolicy::default(),
            asset_root: None,
        }
    }
}

impl LoaderConfig {
    /// Default configuration: one worker, propagate dependency failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads; values above the cap are clamped.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.min(MAX_LOADER_THREADS);
        self
    }

    /// Size the pool from the number of logical CPUs, within the cap.
    #[must_use]
    pub fn with_available_parallelism(self) -> Self {
        self.with_worker_count(num_cpus::get())
    }

    /// Set the worker thread stack size.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, bytes: usize) -> Self {
        self.thread_stack_size = bytes;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Set the dependency failure policy.
    #[must_use]
    pub const fn with_dependency_policy(mut self, policy: DependencyPolicy) -> Self {
        self.dependency_policy = policy;
        self
    }

    /// Read assets from files under `root`.
    #[must_use]
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count > MAX_LOADER_THREADS {
            return Err(format!(
                "worker_count must be at most {MAX_LOADER_THREADS}, got {}",
                self.worker_count
            ));
        }
        if self.thread_stack_size == 0 {
            return Err("thread_stack_size must be greater than 0".into());
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate. Missing fields
    /// take their default values.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, loading a `.env`
    /// file first if one exists.
    ///
    /// Recognized variables: `LOADER_WORKERS`, `LOADER_STACK_SIZE`,
    /// `LOADER_THREAD_PREFIX`, `LOADER_DEPENDENCY_POLICY`, `LOADER_ASSET_ROOT`.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unparsable variable or validation failure.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Some(raw) = lookup("LOADER_WORKERS") {
            let count: usize = raw
                .trim()
                .parse()
                .map_err(|e| format!("LOADER_WORKERS: {e}"))?;
            cfg = cfg.with_worker_count(count);
        }
        if let Some(raw) = lookup("LOADER_STACK_SIZE") {
            cfg.thread_stack_size = raw
                .trim()
                .parse()
                .map_err(|e| format!("LOADER_STACK_SIZE: {e}"))?;
        }
        if let Some(prefix) = lookup("LOADER_THREAD_PREFIX") {
            cfg.thread_name_prefix = prefix;
        }
        if let Some(raw) = lookup("LOADER_DEPENDENCY_POLICY") {
            cfg.dependency_policy = raw
                .parse()
                .map_err(|e| format!("LOADER_DEPENDENCY_POLICY: {e}"))?;
        }
        if let Some(root) = lookup("LOADER_ASSET_ROOT") {
            cfg.asset_root = Some(PathBuf::from(root));
        }
        cfg.validate()?;
        Ok(cfg)
    }
}
