//! Jobs, the scheduler that drives them, and the assets they populate.

pub mod asset;
pub mod audit;
pub mod context;
pub mod error;
pub mod job;
pub mod kind;
pub mod scheduler;
mod worker;

pub use asset::{Aspect, AspectHandle, Asset, AssetRegistry, LogicPath};
pub use audit::{build_job_event, EventSink, InMemoryEventSink, JobAction, JobEvent};
pub use context::LoadContext;
pub use error::{AppResult, LoadError, SchedulerError};
pub use job::{Affinity, Callback, JobHandle, JobId, JobState, PendingCallbacks};
pub use kind::JobKind;
pub use scheduler::{LoaderStats, Scheduler, SchedulerHandle};
