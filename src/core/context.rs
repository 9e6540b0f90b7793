//! Load-phase context: reading the resource and requesting dependencies.

use std::sync::Arc;

use tracing::debug;

use crate::core::asset::{AspectHandle, LogicPath};
use crate::core::error::LoadError;
use crate::core::job::{JobHandle, JobState, Notification};
use crate::core::kind::JobKind;
use crate::core::scheduler::SchedulerHandle;

/// Handed to [`JobKind::load`]. Gives access to the job's own path, the
/// asset source and the scheduler.
pub struct LoadContext<'a> {
    job: &'a JobHandle,
    scheduler: &'a SchedulerHandle,
}

impl<'a> LoadContext<'a> {
    pub(crate) const fn new(job: &'a JobHandle, scheduler: &'a SchedulerHandle) -> Self {
        Self { job, scheduler }
    }

    /// Logical path of the aspect being loaded.
    #[must_use]
    pub fn path(&self) -> &LogicPath {
        self.job.path()
    }

    /// The job running this load phase.
    #[must_use]
    pub const fn job(&self) -> &JobHandle {
        self.job
    }

    /// Scheduler the job belongs to.
    #[must_use]
    pub const fn scheduler(&self) -> &SchedulerHandle {
        self.scheduler
    }

    /// Resolve `path` relative to the directory of the job's own path.
    #[must_use]
    pub fn resolve(&self, path: &str) -> LogicPath {
        self.job.path().dir().join(path)
    }

    /// Read the bytes of the job's own resource.
    ///
    /// # Errors
    ///
    /// [`LoadError::NotFound`] if the source has no such resource,
    /// [`LoadError::Io`] for other read failures.
    pub fn read_bytes(&self) -> Result<Vec<u8>, LoadError> {
        self.read_path(self.job.path())
    }

    /// Read the job's own resource as UTF-8 text.
    ///
    /// # Errors
    ///
    /// As [`read_bytes`](Self::read_bytes), plus [`LoadError::Decode`] for invalid UTF-8.
    pub fn read_to_string(&self) -> Result<String, LoadError> {
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes).map_err(|e| LoadError::decode(self.job.path(), e.to_string()))
    }

    /// Read any resource from the scheduler's source.
    ///
    /// # Errors
    ///
    /// [`LoadError::NotFound`] if the source has no such resource,
    /// [`LoadError::Io`] for other read failures.
    pub fn read_path(&self, path: &LogicPath) -> Result<Vec<u8>, LoadError> {
        self.scheduler
            .source()
            .read(path)
            .map_err(|e| LoadError::from_io(path, e))
    }

    /// Make this job depend on loading `path` (relative to this job's
    /// directory) with `kind`.
    ///
    /// The child is resolved or created through the scheduler's normal
    /// submission path. `on_done` receives the child's aspect once the child
    /// is committed, then the child's completion is reported to this job,
    /// which cannot become `Ready` until every requested child has completed.
    /// If the child is already committed, `on_done` runs right away.
    ///
    /// The worker never blocks on the child. Requesting a job that (directly
    /// or transitively) depends on this one deadlocks both.
    ///
    /// # Errors
    ///
    /// [`LoadError::Rejected`] if the scheduler refuses the submission.
    pub fn request<K: JobKind>(
        &mut self,
        path: &str,
        kind: K,
        on_done: impl FnOnce(&AspectHandle<K::Output>) + Send + 'static,
    ) -> Result<JobHandle, LoadError> {
        let path = self.resolve(path);
        let aspect = self
            .scheduler
            .registry()
            .get_or_create_aspect::<K::Output>(path.clone());
        let child = self
            .scheduler
            .submit_aspect(&aspect, kind)
            .map_err(|e| e.into_load_error(&path))?;

        debug!(parent = %self.job.id(), child = %child.id(), path = %path, "dependency requested");

        if child.state() == JobState::Committed {
            on_done(&aspect);
            return Ok(child);
        }

        self.job.add_dependency();
        let done_aspect = Arc::clone(&aspect);
        let note = Notification::Dependency {
            parent: self.job.clone(),
            on_done: Box::new(move || on_done(&done_aspect)),
        };
        // The child may have committed since the check above.
        if let Some(note) = child.attach(note) {
            note.fire(&child);
        }
        Ok(child)
    }
}
