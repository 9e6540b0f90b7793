//! # Prometheus Loader
//!
//! An asynchronous resource-loading scheduler with a designated commit thread.
//!
//! Loading a resource is split in two phases:
//!
//! - a **load** phase (reading and decoding bytes) that runs on a pool of
//!   worker threads and may request further resources as dependencies;
//! - a **commit** phase that runs only on the *designated thread*, the thread
//!   owning resources that must not be touched elsewhere (a graphics context,
//!   a UI toolkit, a scripting VM).
//!
//! Every load is a job that moves strictly forward through
//! `Queued → Loading → Ready → Committed`. A job is `Ready` once its own load
//! returned and every dependency it requested is committed. The designated
//! thread commits ready jobs and fires their completion callbacks when it
//! calls [`Scheduler::finalize_pending`] or [`Scheduler::wait_all`].
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use prometheus_loader::{JobKind, LoadContext, LoadError, LoaderConfig, Scheduler};
//!
//! struct Text;
//!
//! impl JobKind for Text {
//!     type Output = String;
//!     type Staged = String;
//!
//!     fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
//!         ctx.read_to_string()
//!     }
//!
//!     fn commit(&mut self, staged: String) -> Result<String, LoadError> {
//!         Ok(staged)
//!     }
//! }
//!
//! let scheduler = Scheduler::new(LoaderConfig::new().with_asset_root("assets"))?;
//! let job = scheduler.submit("readme.txt", Text)?;
//! job.register_callback(|job| println!("{} committed", job.path()));
//! scheduler.wait_all();
//! ```
//!
//! ## Threads
//!
//! [`Scheduler`] is `!Send`: create it on the designated thread. Submissions
//! go through [`SchedulerHandle`], which is `Clone + Send + Sync` and is also
//! what load phases receive through their [`LoadContext`].
//!
//! Diagnostics are emitted with `tracing`; see [`util::init_tracing`].

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Jobs, scheduler, worker pool and asset registry.
pub mod core;
/// Configuration models for the loader.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters: asset sources.
pub mod infra;
/// Async runtime adapters.
#[cfg(feature = "tokio-runtime")]
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::SchedulerBuilder;
pub use crate::config::{DependencyPolicy, LoaderConfig, MAX_LOADER_THREADS};
pub use crate::core::{
    Affinity, Aspect, AspectHandle, Asset, AssetRegistry, JobHandle, JobId, JobKind, JobState,
    LoadContext, LoadError, LoaderStats, LogicPath, Scheduler, SchedulerError, SchedulerHandle,
};
pub use crate::infra::{AssetSource, DirectorySource, MemorySource};
