//! The loader scheduler.
//!
//! Two disjoint queues carry jobs between threads:
//!
//! - the **work queue** (a crossbeam channel) is drained by the worker pool,
//!   which runs load phases;
//! - the **ready list** is drained only by the designated thread inside
//!   [`Scheduler::finalize_pending`], which runs commit steps and fires
//!   completion callbacks. Thread-affine loads requested off the designated
//!   thread wait in a third queue drained at the same point.
//!
//! [`Scheduler`] is the designated-thread owner and is deliberately `!Send`:
//! commit can only be reached from the thread that created it.
//! [`SchedulerHandle`] is the cheap, thread-safe submission handle passed to
//! every job's load phase.

use std::collections::VecDeque;
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::builders::SchedulerBuilder;
use crate::config::{LoaderConfig, MAX_LOADER_THREADS};
use crate::core::asset::{AspectHandle, Asset, AssetRegistry, LogicPath};
use crate::core::audit::{build_job_event, EventSink, JobAction};
use crate::core::error::SchedulerError;
use crate::core::job::{Affinity, JobHandle, JobId, JobSeed, JobState, Notification};
use crate::core::kind::{JobKind, KindBody, PlaceholderBody};
use crate::core::worker::WorkerPool;
use crate::infra::source::AssetSource;

/// Snapshot of scheduler activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderStats {
    /// Target number of worker threads.
    pub worker_count: usize,
    /// Jobs waiting in the work queue.
    pub queued_jobs: usize,
    /// Load phases currently running.
    pub loading_jobs: u64,
    /// Jobs submitted and not yet committed.
    pub outstanding_jobs: usize,
    /// Total jobs created by submissions.
    pub submitted_jobs: u64,
    /// Total jobs committed successfully.
    pub committed_jobs: u64,
    /// Total jobs committed with a failure.
    pub failed_jobs: u64,
}

/// Internal counters (lock-free atomics).
#[derive(Debug, Default)]
struct LoaderCounters {
    loading: AtomicU64,
    submitted: AtomicU64,
    committed: AtomicU64,
    failed: AtomicU64,
}

/// Designated-thread side of the scheduler.
#[derive(Default)]
pub(crate) struct ReadyState {
    ready: VecDeque<JobHandle>,
    affine: VecDeque<JobHandle>,
    deferred: VecDeque<(JobHandle, Notification)>,
    /// Jobs admitted to the lists and not yet committed.
    outstanding: usize,
}

impl ReadyState {
    fn has_work(&self) -> bool {
        !self.ready.is_empty() || !self.affine.is_empty() || !self.deferred.is_empty()
    }
}

/// State shared by the owner, its handles, the workers and every job.
pub(crate) struct Shared {
    config: LoaderConfig,
    registry: Arc<AssetRegistry>,
    source: Arc<dyn AssetSource>,
    events: Option<Arc<dyn EventSink>>,
    designated: ThreadId,
    work_tx: Mutex<Option<Sender<JobHandle>>>,
    work_rx: Receiver<JobHandle>,
    retire_tx: Sender<()>,
    retire_rx: Receiver<()>,
    ready: Mutex<ReadyState>,
    ready_cv: Condvar,
    worker_target: AtomicUsize,
    next_job_id: AtomicU64,
    counters: LoaderCounters,
}

impl Shared {
    pub(crate) const fn work_receiver(&self) -> &Receiver<JobHandle> {
        &self.work_rx
    }

    pub(crate) const fn retire_receiver(&self) -> &Receiver<()> {
        &self.retire_rx
    }

    fn is_designated_thread(&self) -> bool {
        thread::current().id() == self.designated
    }

    fn next_id(&self) -> JobId {
        JobId(self.next_job_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn record(&self, job: &JobHandle, action: JobAction) {
        if let Some(events) = &self.events {
            events.record(build_job_event(job.id(), job.path().as_str(), action));
        }
    }

    /// Count a new job until its commit.
    fn admit(&self, job: &JobHandle) {
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.record(job, JobAction::Submitted);
        self.ready.lock().outstanding += 1;
    }

    pub(crate) fn push_ready(&self, job: JobHandle) {
        self.record(&job, JobAction::Ready);
        self.ready.lock().ready.push_back(job);
        self.ready_cv.notify_all();
    }

    fn push_affine(&self, job: JobHandle) {
        self.ready.lock().affine.push_back(job);
        self.ready_cv.notify_all();
    }

    pub(crate) fn defer(&self, job: JobHandle, note: Notification) {
        self.ready.lock().deferred.push_back((job, note));
        self.ready_cv.notify_all();
    }

    pub(crate) fn wake_designated(&self) {
        let _ready = self.ready.lock();
        self.ready_cv.notify_all();
    }

    pub(crate) fn on_load_started(&self, job: &JobHandle) {
        self.counters.loading.fetch_add(1, Ordering::Relaxed);
        self.record(job, JobAction::Loading);
    }

    pub(crate) fn on_load_finished(&self, _job: &JobHandle) {
        self.counters.loading.fetch_sub(1, Ordering::Relaxed);
    }

    pub(crate) fn on_committed(&self, job: &JobHandle) {
        if job.is_successful() {
            self.counters.committed.fetch_add(1, Ordering::Relaxed);
            self.record(job, JobAction::Committed);
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            self.record(job, JobAction::Failed);
        }
    }

    fn is_open(&self) -> bool {
        self.work_tx.lock().is_some()
    }

    /// Push onto the work queue and wake one idle worker.
    fn enqueue(&self, job: JobHandle) -> Result<(), SchedulerError> {
        {
            let work_tx = self.work_tx.lock();
            let Some(work_tx) = work_tx.as_ref() else {
                return Err(SchedulerError::Shutdown);
            };
            work_tx.send(job).map_err(|_| SchedulerError::Shutdown)?;
        }
        if self.worker_target.load(Ordering::Acquire) == 0 {
            self.wake_designated();
        }
        Ok(())
    }

    /// Close the work queue. Returns whether it was open.
    fn close(&self) -> bool {
        self.work_tx.lock().take().is_some()
    }

    fn inline_work_pending(&self) -> bool {
        self.worker_target.load(Ordering::Acquire) == 0 && !self.work_rx.is_empty()
    }

    fn finalize_pending(&self, handle: &SchedulerHandle) -> usize {
        assert!(
            self.is_designated_thread(),
            "finalize_pending called off the designated thread"
        );

        // Each queue is popped one entry at a time, bounded by its length on
        // entry, so a nested finalize (from a callback or a load running here)
        // sees and can finish the rest of the batch.
        let affine = self.ready.lock().affine.len();
        for _ in 0..affine {
            let Some(job) = self.ready.lock().affine.pop_front() else {
                break;
            };
            debug!(job_id = %job.id(), path = %job.path(), "loading thread-affine job on the designated thread");
            job.run_load(handle);
        }

        // Cooperative mode: without workers the designated thread runs loads itself.
        if self.worker_target.load(Ordering::Acquire) == 0 {
            while let Ok(job) = self.work_rx.try_recv() {
                job.run_load(handle);
            }
        }

        let deferred = self.ready.lock().deferred.len();
        for _ in 0..deferred {
            let Some((job, note)) = self.ready.lock().deferred.pop_front() else {
                break;
            };
            note.fire(&job);
        }

        let ready = self.ready.lock().ready.len();
        let mut committed = 0;
        for _ in 0..ready {
            let Some(job) = self.ready.lock().ready.pop_front() else {
                break;
            };
            job.commit();
            self.ready.lock().outstanding -= 1;
            committed += 1;
        }
        if committed > 0 {
            debug!(committed = committed, "finalized pending jobs");
        }
        committed
    }

    /// Finalize repeatedly, sleeping between rounds, until `done` holds.
    fn pump_until(&self, handle: &SchedulerHandle, mut done: impl FnMut(&ReadyState) -> bool) {
        loop {
            self.finalize_pending(handle);
            let mut ready = self.ready.lock();
            loop {
                if done(&ready) {
                    return;
                }
                if ready.has_work() || self.inline_work_pending() {
                    break;
                }
                self.ready_cv.wait(&mut ready);
            }
        }
    }
}

/// Cheap, cloneable, thread-safe handle for submitting and inspecting jobs.
#[derive(Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    pub(crate) const fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Registry holding the aspects jobs load into.
    #[must_use]
    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.shared.registry
    }

    /// Byte source load phases read from.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn AssetSource> {
        &self.shared.source
    }

    /// Configuration the scheduler was built with.
    #[must_use]
    pub fn config(&self) -> &LoaderConfig {
        &self.shared.config
    }

    /// Whether the calling thread is the designated thread.
    #[must_use]
    pub fn is_designated_thread(&self) -> bool {
        self.shared.is_designated_thread()
    }

    /// Whether new work is accepted.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Jobs waiting in the work queue.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.shared.work_rx.len()
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> LoaderStats {
        let shared = &self.shared;
        LoaderStats {
            worker_count: shared.worker_target.load(Ordering::Acquire),
            queued_jobs: shared.work_rx.len(),
            loading_jobs: shared.counters.loading.load(Ordering::Relaxed),
            outstanding_jobs: shared.ready.lock().outstanding,
            submitted_jobs: shared.counters.submitted.load(Ordering::Relaxed),
            committed_jobs: shared.counters.committed.load(Ordering::Relaxed),
            failed_jobs: shared.counters.failed.load(Ordering::Relaxed),
        }
    }

    /// Load the `K::Output` aspect of `path` in the background.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Shutdown`] once the scheduler stopped accepting work.
    pub fn submit<K: JobKind>(
        &self,
        path: impl Into<LogicPath>,
        kind: K,
    ) -> Result<JobHandle, SchedulerError> {
        let aspect = self.shared.registry.get_or_create_aspect::<K::Output>(path);
        self.submit_aspect(&aspect, kind)
    }

    /// Load an aspect in the background.
    ///
    /// - If the aspect has an active job, that job is returned.
    /// - If the aspect is already populated, an immediately ready placeholder
    ///   job is returned.
    /// - Otherwise a new job is created and registered on the aspect. Worker
    ///   kinds go to the work queue. Thread-affine kinds load right away when
    ///   called on the designated thread, and are handed to the designated
    ///   thread otherwise.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Shutdown`] once the scheduler stopped accepting work.
    pub fn submit_aspect<K: JobKind>(
        &self,
        aspect: &AspectHandle<K::Output>,
        kind: K,
    ) -> Result<JobHandle, SchedulerError> {
        if !self.is_open() {
            return Err(SchedulerError::Shutdown);
        }

        let mut slot = aspect.active_slot();
        if let Some(active) = slot.as_ref() {
            debug!(job_id = %active.id(), path = %aspect.path(), "aspect already has an active job");
            return Ok(active.clone());
        }

        if aspect.is_valid() {
            let job = self.new_placeholder(aspect);
            *slot = Some(job.clone());
            drop(slot);
            self.shared.admit(&job);
            self.shared.push_ready(job.clone());
            return Ok(job);
        }

        let job = self.new_job(aspect, kind, false);
        *slot = Some(job.clone());
        drop(slot);
        self.shared.admit(&job);
        self.dispatch(&job);
        Ok(job)
    }

    /// Load `path` again even if its aspect is populated.
    ///
    /// A load already in flight is returned as-is. A pending placeholder is
    /// superseded: its waiting callbacks move to the new job.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Shutdown`] once the scheduler stopped accepting work.
    pub fn reload<K: JobKind>(
        &self,
        path: impl Into<LogicPath>,
        kind: K,
    ) -> Result<JobHandle, SchedulerError> {
        if !self.is_open() {
            return Err(SchedulerError::Shutdown);
        }
        let aspect = self.shared.registry.get_or_create_aspect::<K::Output>(path);

        let mut slot = aspect.active_slot();
        let waiting = match slot.as_ref() {
            Some(active) if !active.is_placeholder() => return Ok(active.clone()),
            Some(placeholder) => Some(placeholder.steal_callbacks()),
            None => None,
        };
        let job = self.new_job(&aspect, kind, false);
        if let Some(waiting) = waiting {
            debug!(job_id = %job.id(), callbacks = waiting.len(), "reload supersedes placeholder");
            job.adopt_callbacks(waiting);
        }
        *slot = Some(job.clone());
        drop(slot);
        self.shared.admit(&job);
        self.dispatch(&job);
        Ok(job)
    }

    /// Submit and return the asset rather than the job.
    ///
    /// # Errors
    ///
    /// As [`submit`](Self::submit).
    pub fn load_asset<K: JobKind>(
        &self,
        path: impl Into<LogicPath>,
        kind: K,
    ) -> Result<Arc<Asset>, SchedulerError> {
        let job = self.submit(path, kind)?;
        Ok(self.shared.registry.get_or_create_asset(job.path()))
    }

    /// Load the `K::Output` aspect of `path` on the calling thread.
    ///
    /// # Errors
    ///
    /// As [`submit_sync_aspect`](Self::submit_sync_aspect).
    pub fn submit_sync<K: JobKind>(
        &self,
        path: impl Into<LogicPath>,
        kind: K,
    ) -> Result<JobHandle, SchedulerError> {
        let aspect = self.shared.registry.get_or_create_aspect::<K::Output>(path);
        self.submit_sync_aspect(&aspect, kind)
    }

    /// Run a load on the calling thread without going through the work queue.
    ///
    /// On the designated thread the job is also committed before returning,
    /// finalizing other jobs while its dependencies complete. On any other
    /// thread (a worker's load phase included) this returns as soon as the
    /// load phase returns; the job becomes `Ready` once its dependencies are
    /// committed and the designated thread commits it as usual.
    ///
    /// An aspect that is already populated is not loaded again: the result is
    /// a placeholder job, committed before returning on the designated thread
    /// and left on the ready list elsewhere. Use [`reload`](Self::reload) to
    /// force a fresh load.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::ThreadAffinity`] for a thread-affine kind off the
    ///   designated thread.
    /// - [`SchedulerError::AspectBusy`] if the aspect already has an active job.
    pub fn submit_sync_aspect<K: JobKind>(
        &self,
        aspect: &AspectHandle<K::Output>,
        kind: K,
    ) -> Result<JobHandle, SchedulerError> {
        let designated = self.is_designated_thread();
        if kind.affinity() == Affinity::DesignatedThread && !designated {
            return Err(SchedulerError::ThreadAffinity {
                path: aspect.path().clone(),
            });
        }

        let (job, placeholder) = {
            let mut slot = aspect.active_slot();
            if slot.is_some() {
                return Err(SchedulerError::AspectBusy {
                    path: aspect.path().clone(),
                });
            }
            let placeholder = aspect.is_valid();
            let job = if placeholder {
                self.new_placeholder(aspect)
            } else {
                self.new_job(aspect, kind, designated)
            };
            *slot = Some(job.clone());
            (job, placeholder)
        };

        if placeholder {
            debug!(job_id = %job.id(), path = %job.path(), "aspect already loaded, skipping synchronous load");
            if designated {
                self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
                self.shared.record(&job, JobAction::Submitted);
                self.shared.record(&job, JobAction::Ready);
                job.commit();
            } else {
                self.shared.admit(&job);
                self.shared.push_ready(job.clone());
            }
            return Ok(job);
        }

        info!(job_id = %job.id(), path = %job.path(), "loading synchronously");
        if designated {
            self.shared.counters.submitted.fetch_add(1, Ordering::Relaxed);
            self.shared.record(&job, JobAction::Submitted);
            job.run_load(self);
            self.shared
                .pump_until(self, |_| job.state() >= JobState::Ready);
            job.commit();
        } else {
            self.shared.admit(&job);
            job.run_load(self);
        }
        Ok(job)
    }

    fn dispatch(&self, job: &JobHandle) {
        match job.affinity() {
            Affinity::DesignatedThread if self.is_designated_thread() => {
                debug!(job_id = %job.id(), path = %job.path(), "loading thread-affine job inline");
                job.run_load(self);
            }
            Affinity::DesignatedThread => {
                debug!(job_id = %job.id(), path = %job.path(), "handing thread-affine job to the designated thread");
                self.shared.push_affine(job.clone());
            }
            Affinity::AnyThread => {
                info!(job_id = %job.id(), path = %job.path(), kind = job.kind_name(), "request loading");
                if let Err(err) = self.shared.enqueue(job.clone()) {
                    warn!(job_id = %job.id(), path = %job.path(), error = %err, "work queue closed");
                    job.reject(err.into_load_error(job.path()));
                }
            }
        }
    }

    fn new_job<K: JobKind>(
        &self,
        aspect: &AspectHandle<K::Output>,
        kind: K,
        inline_commit: bool,
    ) -> JobHandle {
        JobHandle::new(JobSeed {
            id: self.shared.next_id(),
            path: aspect.path().clone(),
            kind: kind.name(),
            affinity: kind.affinity(),
            placeholder: false,
            inline_commit,
            policy: self.shared.config.dependency_policy,
            scheduler: Arc::downgrade(&self.shared),
            body: Box::new(KindBody::new(kind, Arc::clone(aspect))),
        })
    }

    fn new_placeholder<T: Send + Sync + 'static>(&self, aspect: &AspectHandle<T>) -> JobHandle {
        JobHandle::new(JobSeed {
            id: self.shared.next_id(),
            path: aspect.path().clone(),
            kind: "placeholder",
            affinity: Affinity::AnyThread,
            placeholder: true,
            inline_commit: false,
            policy: self.shared.config.dependency_policy,
            scheduler: Arc::downgrade(&self.shared),
            body: Box::new(PlaceholderBody::new(Arc::clone(aspect))),
        })
    }
}

/// Owner of the worker pool and the only way to commit jobs.
///
/// Create it on the designated thread (the thread owning thread-confined
/// resources). It is `!Send`, so commit steps and thread-affine loads can only
/// ever run there. Submission methods are available through `Deref` to
/// [`SchedulerHandle`].
///
/// Dropping the scheduler closes the work queue and detaches the workers,
/// which finish the queued loads and exit. Use [`shutdown`](Self::shutdown)
/// to also commit everything and join the workers.
pub struct Scheduler {
    handle: SchedulerHandle,
    pool: Mutex<WorkerPool>,
    _designated: PhantomData<*const ()>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Build a scheduler on the current (designated) thread.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] or [`SchedulerError::Spawn`].
    pub fn new(config: LoaderConfig) -> Result<Self, SchedulerError> {
        SchedulerBuilder::new(config).build()
    }

    /// Start building a scheduler with a custom registry, source or event sink.
    #[must_use]
    pub fn builder(config: LoaderConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: LoaderConfig,
        registry: Arc<AssetRegistry>,
        source: Arc<dyn AssetSource>,
        events: Option<Arc<dyn EventSink>>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (work_tx, work_rx) = unbounded();
        let (retire_tx, retire_rx) = unbounded();
        let pool = WorkerPool::new(config.thread_stack_size, config.thread_name_prefix.clone());
        let worker_count = config.worker_count;

        let shared = Arc::new(Shared {
            config,
            registry,
            source,
            events,
            designated: thread::current().id(),
            work_tx: Mutex::new(Some(work_tx)),
            work_rx,
            retire_tx,
            retire_rx,
            ready: Mutex::new(ReadyState::default()),
            ready_cv: Condvar::new(),
            worker_target: AtomicUsize::new(0),
            next_job_id: AtomicU64::new(1),
            counters: LoaderCounters::default(),
        });

        let scheduler = Self {
            handle: SchedulerHandle { shared },
            pool: Mutex::new(pool),
            _designated: PhantomData,
        };
        scheduler.set_thread_count(worker_count)?;
        info!(
            worker_count = worker_count,
            dependency_policy = ?scheduler.handle.shared.config.dependency_policy,
            "loader scheduler initialized"
        );
        Ok(scheduler)
    }

    /// Thread-safe handle for submissions, including from load phases.
    #[must_use]
    pub const fn handle(&self) -> &SchedulerHandle {
        &self.handle
    }

    /// Commit every job currently on the ready list and fire their callbacks.
    ///
    /// Also runs pending thread-affine loads and, when the pool has no
    /// workers, the queued loads. Jobs that become ready during this call are
    /// left for the next one. Returns the number of jobs committed.
    pub fn finalize_pending(&self) -> usize {
        self.reap_workers();
        self.handle.shared.finalize_pending(&self.handle)
    }

    /// Finalize until no job is queued, loading, ready or waiting for a
    /// callback, including jobs submitted by callbacks fired meanwhile.
    ///
    /// Blocks forever on a dependency cycle or if a worker died mid-load.
    pub fn wait_all(&self) {
        debug!("waiting for all loader jobs");
        self.reap_workers();
        self.handle
            .shared
            .pump_until(&self.handle, |ready| ready.outstanding == 0 && !ready.has_work());
    }

    /// Finalize until `job` is committed.
    pub fn wait_for(&self, job: &JobHandle) {
        self.reap_workers();
        self.handle
            .shared
            .pump_until(&self.handle, |_| job.state() == JobState::Committed);
    }

    /// Target number of worker threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.handle.shared.worker_target.load(Ordering::Acquire)
    }

    /// Resize the worker pool, clamped to [`MAX_LOADER_THREADS`]. Returns the
    /// new target. Extra workers retire after their current load.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::Spawn`] if a thread cannot be started; workers
    /// started before the failure keep running.
    pub fn set_thread_count(&self, count: usize) -> Result<usize, SchedulerError> {
        let count = count.min(MAX_LOADER_THREADS);
        let shared = &self.handle.shared;
        let mut pool = self.pool.lock();
        Self::reap_locked(shared, &mut pool);

        let mut current = shared.worker_target.load(Ordering::Acquire);
        if count < current {
            for _ in count..current {
                // Shared owns the receiver, so this cannot be disconnected.
                let _ = shared.retire_tx.send(());
            }
            shared.worker_target.store(count, Ordering::Release);
            shared.wake_designated();
        } else {
            // Retire tokens nobody took yet cancel out against growth.
            while current < count && shared.retire_rx.try_recv().is_ok() {
                current += 1;
                shared.worker_target.store(current, Ordering::Release);
            }
            while current < count {
                pool.spawn(&self.handle)?;
                current += 1;
                shared.worker_target.store(current, Ordering::Release);
            }
        }
        info!(thread_count = count, live_threads = pool.live(), "loader pool resized");
        Ok(count)
    }

    /// Commit everything, close the work queue and join every worker.
    pub fn shutdown(self) {
        self.wait_all();
        self.handle.shared.close();
        let panicked = self.pool.lock().join_all();
        self.handle.shared.worker_target.store(0, Ordering::Release);
        info!(panicked_workers = panicked, "loader scheduler shut down");
    }

    fn reap_workers(&self) {
        let mut pool = self.pool.lock();
        Self::reap_locked(&self.handle.shared, &mut pool);
    }

    fn reap_locked(shared: &Shared, pool: &mut WorkerPool) {
        let panicked = pool.reap();
        if panicked > 0 {
            let _ = shared
                .worker_target
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                    Some(n.saturating_sub(panicked))
                });
            warn!(panicked_workers = panicked, "loader workers lost to panics");
        }
    }
}

impl Deref for Scheduler {
    type Target = SchedulerHandle;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if self.handle.shared.close() {
            debug!("Scheduler dropped without explicit shutdown - workers will be detached");
        }
    }
}
