//! Error types for loading and scheduling.

use thiserror::Error;

use crate::core::asset::LogicPath;

/// Why a job failed to produce its aspect.
///
/// Failures are recorded on the job and logged; they never cross threads as
/// panics. Callers check [`JobHandle::is_successful`](crate::core::JobHandle::is_successful)
/// once the job is `Ready` or `Committed`.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The source has no resource at this path.
    #[error("resource not found: {path}")]
    NotFound {
        /// Logical path of the missing resource.
        path: LogicPath,
    },
    /// The resource exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Logical path of the unreadable resource.
        path: LogicPath,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The resource was read but its content is malformed.
    #[error("failed to decode {path}: {reason}")]
    Decode {
        /// Logical path of the malformed resource.
        path: LogicPath,
        /// Decoder diagnostic.
        reason: String,
    },
    /// A required child job failed.
    #[error("dependency {path} failed: {reason}")]
    Dependency {
        /// Logical path of the failed dependency.
        path: LogicPath,
        /// Failure reported by the dependency.
        reason: String,
    },
    /// A thread-confined load was requested from a thread that may not run it.
    #[error("thread-affine load of {path} requested off the designated thread")]
    ThreadAffinity {
        /// Logical path of the thread-confined resource.
        path: LogicPath,
    },
    /// The scheduler refused the submission (for example after shutdown).
    #[error("load of {path} rejected: {reason}")]
    Rejected {
        /// Logical path of the refused resource.
        path: LogicPath,
        /// Why it was refused.
        reason: String,
    },
    /// Any other decoder failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LoadError {
    /// Build a decode failure for `path`.
    pub fn decode(path: &LogicPath, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.clone(),
            reason: reason.into(),
        }
    }

    /// Map an I/O failure while reading `path`, separating "not found".
    #[must_use]
    pub fn from_io(path: &LogicPath, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path: path.clone() }
        } else {
            Self::Io {
                path: path.clone(),
                source,
            }
        }
    }
}

/// Errors produced by scheduler operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The scheduler has been shut down and accepts no new work.
    #[error("scheduler has been shut down")]
    Shutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
    /// A thread-affine job was requested synchronously off the designated thread.
    #[error("thread-affine load of {path} cannot run on this thread")]
    ThreadAffinity {
        /// Logical path of the thread-confined resource.
        path: LogicPath,
    },
    /// The aspect has a job in flight.
    #[error("aspect {path} has an active job")]
    AspectBusy {
        /// Logical path of the busy aspect.
        path: LogicPath,
    },
}

impl SchedulerError {
    /// Convert a refused submission into the failure recorded on a parent job.
    #[must_use]
    pub fn into_load_error(self, path: &LogicPath) -> LoadError {
        match self {
            Self::ThreadAffinity { path } => LoadError::ThreadAffinity { path },
            other => LoadError::Rejected {
                path: path.clone(),
                reason: other.to_string(),
            },
        }
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
