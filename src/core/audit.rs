//! Job lifecycle audit trail.
//!
//! An optional [`EventSink`] receives one [`JobEvent`] per lifecycle step,
//! tagged with the thread that performed it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::job::JobId;
use crate::util::clock::{current_thread_label, now_ms};

/// Lifecycle step recorded for a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobAction {
    /// Job created by a submission.
    Submitted,
    /// Load phase started.
    Loading,
    /// Job became ready for commit.
    Ready,
    /// Job committed successfully.
    Committed,
    /// Job committed with a recorded failure.
    Failed,
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Submitted => "submitted",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Audit event structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEvent {
    /// Event identifier.
    pub event_id: String,
    /// Related job.
    pub job_id: JobId,
    /// Logical path of the job's aspect.
    pub path: String,
    /// Lifecycle step.
    pub action: JobAction,
    /// Thread that performed the step.
    pub thread: String,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Audit sink abstraction.
pub trait EventSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: JobEvent);
}

/// In-memory audit sink for testing and tooling. Clones share one buffer.
#[derive(Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<JobEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<JobEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Events recorded for one job, oldest first.
    #[must_use]
    pub fn events_for(&self, job_id: JobId) -> Vec<JobEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.job_id == job_id)
            .cloned()
            .collect()
    }

    /// Stored events as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns the serializer error, which cannot happen for these plain types.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.events())
    }
}

impl fmt::Debug for InMemoryEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryEventSink")
            .field("events", &self.events.lock().len())
            .field("max_events", &self.max_events)
            .finish()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: JobEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Helper to build an audit event on the current thread.
pub fn build_job_event(job_id: JobId, path: impl Into<String>, action: JobAction) -> JobEvent {
    JobEvent {
        event_id: uuid::Uuid::new_v4().to_string(),
        job_id,
        path: path.into(),
        action,
        thread: current_thread_label(),
        created_at_ms: now_ms(),
    }
}
