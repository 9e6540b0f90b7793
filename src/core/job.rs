//! Jobs: one scheduled load of one aspect.
//!
//! A job moves strictly forward through [`JobState::Queued`] →
//! [`JobState::Loading`] → [`JobState::Ready`] → [`JobState::Committed`].
//! Failure is recorded on the job, not expressed as a different path through
//! the state machine, so dependents are never left blocked.
//!
//! Dependencies report back by posting a [`DependencyDone`] message to the
//! parent's inbox. The parent drains its inbox under its own lock and decides
//! the `Loading → Ready` transition there, on whatever thread posted.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::DependencyPolicy;
use crate::core::asset::LogicPath;
use crate::core::audit::JobAction;
use crate::core::context::LoadContext;
use crate::core::error::LoadError;
use crate::core::kind::JobBody;
use crate::core::scheduler::{SchedulerHandle, Shared};

/// Lifecycle of a job. Ordered: a job's state never decreases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created, load phase not started.
    Queued,
    /// Load phase running, or returned with dependencies outstanding.
    Loading,
    /// Load phase returned and every dependency completed; awaiting commit.
    Ready,
    /// Committed on the designated thread and callbacks fired.
    Committed,
}

/// Where a job's load phase may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    /// Any worker thread.
    #[default]
    AnyThread,
    /// Only the designated thread (owner of thread-confined resources).
    DesignatedThread,
}

/// Process-unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Completion callback. Runs on the designated thread once the job is committed.
pub type Callback = Box<dyn FnOnce(&JobHandle) + Send + 'static>;

/// Completion message a dependency posts to its parent.
#[derive(Debug)]
pub(crate) struct DependencyDone {
    child: JobId,
    path: LogicPath,
    failure: Option<Arc<LoadError>>,
}

/// A pending completion notification.
pub(crate) enum Notification {
    Callback(Callback),
    Dependency {
        parent: JobHandle,
        on_done: Box<dyn FnOnce() + Send + 'static>,
    },
}

impl Notification {
    /// Deliver this notification for the completed `job`.
    pub(crate) fn fire(self, job: &JobHandle) {
        match self {
            Self::Callback(callback) => callback(job),
            Self::Dependency { parent, on_done } => {
                on_done();
                parent.post(DependencyDone {
                    child: job.id(),
                    path: job.path().clone(),
                    failure: job.failure(),
                });
            }
        }
    }
}

/// Callbacks detached from one job so they can be handed to another.
pub struct PendingCallbacks(Vec<Notification>);

impl PendingCallbacks {
    /// Number of detached notifications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether nothing was detached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for PendingCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingCallbacks").field(&self.0.len()).finish()
    }
}

struct JobCore {
    state: JobState,
    dependencies: usize,
    load_returned: bool,
    failure: Option<Arc<LoadError>>,
    callbacks: Vec<Notification>,
    inbox: Vec<DependencyDone>,
}

struct JobInner {
    id: JobId,
    path: LogicPath,
    kind: &'static str,
    affinity: Affinity,
    placeholder: bool,
    inline_commit: bool,
    policy: DependencyPolicy,
    scheduler: Weak<Shared>,
    core: Mutex<JobCore>,
    ready_cv: Condvar,
    body: Mutex<Option<Box<dyn JobBody>>>,
}

/// Everything needed to create a job.
pub(crate) struct JobSeed {
    pub id: JobId,
    pub path: LogicPath,
    pub kind: &'static str,
    pub affinity: Affinity,
    pub placeholder: bool,
    pub inline_commit: bool,
    pub policy: DependencyPolicy,
    pub scheduler: Weak<Shared>,
    pub body: Box<dyn JobBody>,
}

/// Shared, reference-counted handle to a job.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<JobInner>,
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("path", &self.inner.path)
            .field("kind", &self.inner.kind)
            .field("state", &self.state())
            .finish()
    }
}

impl JobHandle {
    pub(crate) fn new(seed: JobSeed) -> Self {
        // Placeholders stand in for an aspect that is already populated.
        let (state, load_returned) = if seed.placeholder {
            (JobState::Ready, true)
        } else {
            (JobState::Queued, false)
        };
        Self {
            inner: Arc::new(JobInner {
                id: seed.id,
                path: seed.path,
                kind: seed.kind,
                affinity: seed.affinity,
                placeholder: seed.placeholder,
                inline_commit: seed.inline_commit,
                policy: seed.policy,
                scheduler: seed.scheduler,
                core: Mutex::new(JobCore {
                    state,
                    dependencies: 0,
                    load_returned,
                    failure: None,
                    callbacks: Vec::new(),
                    inbox: Vec::new(),
                }),
                ready_cv: Condvar::new(),
                body: Mutex::new(Some(seed.body)),
            }),
        }
    }

    /// Job identifier.
    #[must_use]
    pub fn id(&self) -> JobId {
        self.inner.id
    }

    /// Logical path of the aspect this job loads.
    #[must_use]
    pub fn path(&self) -> &LogicPath {
        &self.inner.path
    }

    /// Name of the job kind, for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        self.inner.kind
    }

    /// Where the load phase may run.
    #[must_use]
    pub fn affinity(&self) -> Affinity {
        self.inner.affinity
    }

    /// Whether this job only stands in for an already-populated aspect.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.inner.placeholder
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> JobState {
        self.inner.core.lock().state
    }

    /// Whether the job succeeded. Only meaningful once `Ready` or `Committed`;
    /// earlier it reports `false`.
    #[must_use]
    pub fn is_successful(&self) -> bool {
        let core = self.inner.core.lock();
        core.state >= JobState::Ready && core.failure.is_none()
    }

    /// The recorded failure, if any.
    #[must_use]
    pub fn failure(&self) -> Option<Arc<LoadError>> {
        self.inner.core.lock().failure.clone()
    }

    /// Whether `self` and `other` are the same job.
    #[must_use]
    pub fn same_job(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Block until the job is at least `Ready`.
    ///
    /// Dependencies complete when they are committed, which only happens
    /// inside `finalize_pending`. On the designated thread use
    /// [`Scheduler::wait_for`](crate::core::Scheduler::wait_for) instead.
    pub fn wait(&self) {
        let mut core = self.inner.core.lock();
        while core.state < JobState::Ready {
            self.inner.ready_cv.wait(&mut core);
        }
    }

    /// Block until the job is at least `Ready` or `timeout` elapses.
    /// Returns whether the job is ready.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut core = self.inner.core.lock();
        while core.state < JobState::Ready {
            if self
                .inner
                .ready_cv
                .wait_until(&mut core, deadline)
                .timed_out()
            {
                return core.state >= JobState::Ready;
            }
        }
        true
    }

    /// Append a completion callback. It runs on the designated thread after
    /// the job commits; if the job is already committed it runs during the
    /// next `finalize_pending`.
    pub fn register_callback(&self, callback: impl FnOnce(&Self) + Send + 'static) {
        if let Some(note) = self.attach(Notification::Callback(Box::new(callback))) {
            self.defer(note);
        }
    }

    /// Detach every pending callback, leaving the list empty.
    #[must_use]
    pub fn steal_callbacks(&self) -> PendingCallbacks {
        PendingCallbacks(std::mem::take(&mut self.inner.core.lock().callbacks))
    }

    /// Append callbacks detached from another job, preserving their order.
    pub fn adopt_callbacks(&self, pending: PendingCallbacks) {
        for note in pending.0 {
            if let Some(note) = self.attach(note) {
                self.defer(note);
            }
        }
    }

    /// Queue `note` on this job. Hands it back if the job is already committed.
    pub(crate) fn attach(&self, note: Notification) -> Option<Notification> {
        let mut core = self.inner.core.lock();
        if core.state == JobState::Committed {
            return Some(note);
        }
        core.callbacks.push(note);
        None
    }

    fn defer(&self, note: Notification) {
        match self.inner.scheduler.upgrade() {
            Some(shared) => shared.defer(self.clone(), note),
            None => note.fire(self),
        }
    }

    /// Count one more dependency. Only valid while the load phase is running.
    pub(crate) fn add_dependency(&self) {
        let mut core = self.inner.core.lock();
        assert!(
            core.state == JobState::Loading && !core.load_returned,
            "dependency registered on {} outside its load phase",
            self.inner.id
        );
        core.dependencies += 1;
    }

    /// Run the load phase on the current thread.
    pub(crate) fn run_load(&self, scheduler: &SchedulerHandle) {
        {
            let mut core = self.inner.core.lock();
            assert_eq!(
                core.state,
                JobState::Queued,
                "{} started loading twice",
                self.inner.id
            );
            core.state = JobState::Loading;
        }
        debug!(job_id = %self.inner.id, path = %self.inner.path, kind = self.inner.kind, "job loading");
        scheduler.shared().on_load_started(self);

        // The body is only touched by the thread that owns the current phase.
        let mut body = self.inner.body.lock().take();
        let result = match body.as_mut() {
            Some(body) => {
                let mut ctx = LoadContext::new(self, scheduler);
                body.load(&mut ctx)
            }
            None => Ok(()),
        };
        *self.inner.body.lock() = body;

        scheduler.shared().on_load_finished(self);
        self.finish_load(result);
    }

    /// Record the outcome of a load phase that never ran.
    pub(crate) fn reject(&self, error: LoadError) {
        {
            let mut core = self.inner.core.lock();
            if core.state == JobState::Queued {
                core.state = JobState::Loading;
            }
        }
        self.finish_load(Err(error));
    }

    fn finish_load(&self, result: Result<(), LoadError>) {
        let became_ready = {
            let mut core = self.inner.core.lock();
            core.load_returned = true;
            if let Err(error) = result {
                warn!(job_id = %self.inner.id, path = %self.inner.path, error = %error, "load failed");
                core.failure = Some(Arc::new(error));
            }
            self.drain_inbox(&mut core)
        };
        if became_ready {
            self.on_ready();
        }
    }

    /// Deliver a dependency completion message.
    pub(crate) fn post(&self, message: DependencyDone) {
        let became_ready = {
            let mut core = self.inner.core.lock();
            core.inbox.push(message);
            self.drain_inbox(&mut core)
        };
        if became_ready {
            self.on_ready();
        }
    }

    fn drain_inbox(&self, core: &mut JobCore) -> bool {
        for message in std::mem::take(&mut core.inbox) {
            core.dependencies = core
                .dependencies
                .checked_sub(1)
                .unwrap_or_else(|| panic!("{} received more completions than dependencies", self.inner.id));
            debug!(
                job_id = %self.inner.id,
                child = %message.child,
                remaining = core.dependencies,
                "dependency done"
            );
            if let Some(failure) = message.failure {
                if self.inner.policy == DependencyPolicy::Propagate && core.failure.is_none() {
                    warn!(
                        job_id = %self.inner.id,
                        path = %self.inner.path,
                        dependency = %message.path,
                        "dependency failed"
                    );
                    core.failure = Some(Arc::new(LoadError::Dependency {
                        path: message.path,
                        reason: failure.to_string(),
                    }));
                }
            }
        }

        if core.state == JobState::Loading && core.load_returned && core.dependencies == 0 {
            core.state = JobState::Ready;
            self.inner.ready_cv.notify_all();
            return true;
        }
        false
    }

    fn on_ready(&self) {
        debug!(job_id = %self.inner.id, path = %self.inner.path, "job ready");
        if let Some(shared) = self.inner.scheduler.upgrade() {
            if self.inner.inline_commit {
                shared.record(self, JobAction::Ready);
                shared.wake_designated();
            } else {
                shared.push_ready(self.clone());
            }
        }
    }

    /// Run the commit step and fire callbacks. Designated thread only.
    pub(crate) fn commit(&self) {
        assert_eq!(
            self.state(),
            JobState::Ready,
            "commit of {} which is not ready",
            self.inner.id
        );

        let body = self.inner.body.lock().take();
        if let Some(mut body) = body {
            if self.failure().is_none() {
                if let Err(error) = body.commit() {
                    warn!(job_id = %self.inner.id, path = %self.inner.path, error = %error, "commit failed");
                    self.inner.core.lock().failure = Some(Arc::new(error));
                }
            }
            body.release(self);
        }

        let callbacks = {
            let mut core = self.inner.core.lock();
            core.state = JobState::Committed;
            self.inner.ready_cv.notify_all();
            std::mem::take(&mut core.callbacks)
        };
        debug!(
            job_id = %self.inner.id,
            path = %self.inner.path,
            callbacks = callbacks.len(),
            success = self.is_successful(),
            "job committed"
        );
        if let Some(shared) = self.inner.scheduler.upgrade() {
            shared.on_committed(self);
        }
        for note in callbacks {
            note.fire(self);
        }
    }
}
