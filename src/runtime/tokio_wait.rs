//! Waiting on jobs from async code.
//!
//! [`JobHandle::wait`] blocks the calling thread, so these helpers move the
//! wait onto tokio's blocking pool.

use std::time::Duration;

use crate::core::job::JobHandle;

/// Resolve once `job` is at least `Ready`.
///
/// Commit still happens on the designated thread; this only observes the
/// end of the load phase and its dependencies.
pub async fn wait_ready_async(job: &JobHandle) {
    let job = job.clone();
    if tokio::task::spawn_blocking(move || job.wait()).await.is_err() {
        tracing::warn!("blocking wait task was cancelled");
    }
}

/// Like [`wait_ready_async`] with an upper bound. Returns whether the job is ready.
pub async fn wait_ready_timeout_async(job: &JobHandle, timeout: Duration) -> bool {
    let waiting = job.clone();
    tokio::task::spawn_blocking(move || waiting.wait_timeout(timeout))
        .await
        .unwrap_or_else(|_| job.state() >= crate::core::JobState::Ready)
}
