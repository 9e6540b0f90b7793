//! Per-kind load logic supplied by callers.

use crate::core::asset::AspectHandle;
use crate::core::context::LoadContext;
use crate::core::error::LoadError;
use crate::core::job::{Affinity, JobHandle};

/// One kind of load: how to produce an aspect's payload.
///
/// The scheduler decides *when* and *on which thread* each phase runs:
///
/// - [`load`](Self::load) runs on a worker thread (or on the designated
///   thread for [`Affinity::DesignatedThread`] kinds). It may read bytes and
///   request dependencies through the [`LoadContext`].
/// - [`commit`](Self::commit) runs on the designated thread once the load and
///   every dependency are done; it may touch thread-confined resources. Its
///   output becomes the aspect's payload.
///
/// The value implementing this trait carries the per-submission arguments.
///
/// # Example
///
/// ```rust,ignore
/// struct TextLoader;
///
/// impl JobKind for TextLoader {
///     type Output = String;
///     type Staged = String;
///
///     fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<String, LoadError> {
///         ctx.read_to_string()
///     }
///
///     fn commit(&mut self, staged: String) -> Result<String, LoadError> {
///         Ok(staged)
///     }
/// }
/// ```
pub trait JobKind: Send + 'static {
    /// Payload published on the aspect at commit.
    type Output: Send + Sync + 'static;
    /// Intermediate result handed from the load phase to the commit phase.
    type Staged: Send + 'static;

    /// Name used in diagnostics.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Where the load phase may run.
    fn affinity(&self) -> Affinity {
        Affinity::AnyThread
    }

    /// Load phase.
    ///
    /// # Errors
    ///
    /// Any error is recorded on the job; the aspect stays invalid.
    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<Self::Staged, LoadError>;

    /// Commit phase, on the designated thread.
    ///
    /// # Errors
    ///
    /// Any error is recorded on the job; the aspect stays invalid.
    fn commit(&mut self, staged: Self::Staged) -> Result<Self::Output, LoadError>;
}

/// Type-erased job body driven by the job state machine.
pub(crate) trait JobBody: Send {
    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<(), LoadError>;
    fn commit(&mut self) -> Result<(), LoadError>;
    /// Clear the aspect's active-job slot if it still points at `job`.
    fn release(&self, job: &JobHandle);
}

pub(crate) struct KindBody<K: JobKind> {
    kind: K,
    aspect: AspectHandle<K::Output>,
    staged: Option<K::Staged>,
}

impl<K: JobKind> KindBody<K> {
    pub(crate) const fn new(kind: K, aspect: AspectHandle<K::Output>) -> Self {
        Self {
            kind,
            aspect,
            staged: None,
        }
    }
}

impl<K: JobKind> JobBody for KindBody<K> {
    fn load(&mut self, ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        self.staged = Some(self.kind.load(ctx)?);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LoadError> {
        if let Some(staged) = self.staged.take() {
            let output = self.kind.commit(staged)?;
            self.aspect.publish(output);
        }
        Ok(())
    }

    fn release(&self, job: &JobHandle) {
        self.aspect.release(job);
    }
}

/// Body of a job standing in for an already-populated aspect.
pub(crate) struct PlaceholderBody<T> {
    aspect: AspectHandle<T>,
}

impl<T> PlaceholderBody<T> {
    pub(crate) const fn new(aspect: AspectHandle<T>) -> Self {
        Self { aspect }
    }
}

impl<T: Send + Sync + 'static> JobBody for PlaceholderBody<T> {
    fn load(&mut self, _ctx: &mut LoadContext<'_>) -> Result<(), LoadError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LoadError> {
        Ok(())
    }

    fn release(&self, job: &JobHandle) {
        self.aspect.release(job);
    }
}
