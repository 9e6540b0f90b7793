//! Assets, their aspects, and the registry that owns them.
//!
//! An [`Asset`] is identified by a [`LogicPath`]. Each asset has at most one
//! [`Aspect<T>`] per payload type `T`; an aspect holds the committed payload
//! and, while a load is in flight, the single active [`JobHandle`] for it.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::SchedulerError;
use crate::core::job::JobHandle;

/// Normalized, absolute, `/`-separated logical path of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct LogicPath(String);

impl LogicPath {
    /// Normalize `path`: empty and `.` segments are dropped, `..` pops one
    /// segment (never above the root), and the result always starts with `/`.
    pub fn new(path: impl AsRef<str>) -> Self {
        let mut segments: Vec<&str> = Vec::new();
        for segment in path.as_ref().split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                s => segments.push(s),
            }
        }
        Self(format!("/{}", segments.join("/")))
    }

    /// The path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Directory containing this path (the root is its own directory).
    #[must_use]
    pub fn dir(&self) -> Self {
        match self.0.rfind('/') {
            Some(0) | None => Self("/".to_owned()),
            Some(idx) => Self(self.0[..idx].to_owned()),
        }
    }

    /// Last segment, if any.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.0.rsplit('/').next().filter(|s| !s.is_empty())
    }

    /// Resolve `other` against this path: absolute paths are kept as-is,
    /// relative ones are appended.
    #[must_use]
    pub fn join(&self, other: &str) -> Self {
        if other.starts_with('/') {
            Self::new(other)
        } else {
            Self::new(format!("{}/{other}", self.0))
        }
    }

    /// Path relative to the root, suitable for joining onto a directory.
    #[must_use]
    pub fn relative(&self) -> &str {
        self.0.trim_start_matches('/')
    }
}

impl fmt::Display for LogicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicPath {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LogicPath {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&Self> for LogicPath {
    fn from(value: &Self) -> Self {
        value.clone()
    }
}

impl From<LogicPath> for String {
    fn from(value: LogicPath) -> Self {
        value.0
    }
}

/// A resource known to the registry.
#[derive(Debug)]
pub struct Asset {
    path: LogicPath,
}

impl Asset {
    /// Logical path identifying this asset.
    #[must_use]
    pub const fn logic_path(&self) -> &LogicPath {
        &self.path
    }
}

/// Shared handle to an aspect.
pub type AspectHandle<T> = Arc<Aspect<T>>;

/// One typed facet of an asset.
pub struct Aspect<T> {
    asset: Arc<Asset>,
    payload: RwLock<Option<Arc<T>>>,
    active: Mutex<Option<JobHandle>>,
    warned: AtomicBool,
}

impl<T> fmt::Debug for Aspect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aspect")
            .field("path", &self.asset.path)
            .field("valid", &self.payload.read().is_some())
            .finish_non_exhaustive()
    }
}

impl<T: Send + Sync + 'static> Aspect<T> {
    fn new(asset: Arc<Asset>) -> Self {
        Self {
            asset,
            payload: RwLock::new(None),
            active: Mutex::new(None),
            warned: AtomicBool::new(false),
        }
    }

    /// Owning asset.
    #[must_use]
    pub const fn asset(&self) -> &Arc<Asset> {
        &self.asset
    }

    /// Logical path of the owning asset.
    #[must_use]
    pub fn path(&self) -> &LogicPath {
        &self.asset.path
    }

    /// Whether a payload has been committed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.payload.read().is_some()
    }

    /// The committed payload, readable from any thread.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.payload.read().clone()
    }

    /// The job currently loading this aspect, if any.
    #[must_use]
    pub fn active_job(&self) -> Option<JobHandle> {
        self.active.lock().clone()
    }

    /// Whether a job is in flight for this aspect.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Log a warning the first time an invalid aspect is used.
    pub fn warn_if_invalid(&self) {
        if !self.is_valid() && !self.warned.swap(true, Ordering::Relaxed) {
            warn!(path = %self.asset.path, "aspect used before it was successfully loaded");
        }
    }

    /// Drop the committed payload so the aspect can be submitted again.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AspectBusy`] while a job is active.
    pub fn reset(&self) -> Result<Option<Arc<T>>, SchedulerError> {
        let slot = self.active.lock();
        if slot.is_some() {
            return Err(SchedulerError::AspectBusy {
                path: self.asset.path.clone(),
            });
        }
        self.warned.store(false, Ordering::Relaxed);
        Ok(self.payload.write().take())
    }

    /// Locked access to the active-job slot; held while deduplicating submissions.
    pub(crate) fn active_slot(&self) -> MutexGuard<'_, Option<JobHandle>> {
        self.active.lock()
    }

    pub(crate) fn publish(&self, value: T) {
        *self.payload.write() = Some(Arc::new(value));
        self.warned.store(false, Ordering::Relaxed);
    }

    /// Clear the active slot if it still refers to `job`.
    pub(crate) fn release(&self, job: &JobHandle) {
        let mut slot = self.active.lock();
        if slot.as_ref().is_some_and(|active| active.same_job(job)) {
            *slot = None;
        }
    }
}

type AspectKey = (LogicPath, TypeId);

/// Registry of assets and their typed aspects.
#[derive(Default)]
pub struct AssetRegistry {
    assets: RwLock<HashMap<LogicPath, Arc<Asset>>>,
    aspects: RwLock<HashMap<AspectKey, Arc<dyn Any + Send + Sync>>>,
}

impl fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetRegistry")
            .field("assets", &self.assets.read().len())
            .field("aspects", &self.aspects.read().len())
            .finish()
    }
}

impl AssetRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an asset.
    #[must_use]
    pub fn asset(&self, path: &LogicPath) -> Option<Arc<Asset>> {
        self.assets.read().get(path).cloned()
    }

    /// Look up an asset, creating it on first use.
    pub fn get_or_create_asset(&self, path: impl Into<LogicPath>) -> Arc<Asset> {
        let path = path.into();
        if let Some(asset) = self.assets.read().get(&path) {
            return Arc::clone(asset);
        }
        let mut assets = self.assets.write();
        Arc::clone(
            assets
                .entry(path.clone())
                .or_insert_with(|| Arc::new(Asset { path })),
        )
    }

    /// Look up the `T` aspect of an asset.
    #[must_use]
    pub fn aspect<T: Send + Sync + 'static>(&self, path: &LogicPath) -> Option<AspectHandle<T>> {
        let key = (path.clone(), TypeId::of::<Aspect<T>>());
        let erased = self.aspects.read().get(&key).cloned()?;
        erased.downcast::<Aspect<T>>().ok()
    }

    /// Look up the `T` aspect of an asset, creating the asset and aspect on first use.
    pub fn get_or_create_aspect<T: Send + Sync + 'static>(
        &self,
        path: impl Into<LogicPath>,
    ) -> AspectHandle<T> {
        let path = path.into();
        if let Some(aspect) = self.aspect::<T>(&path) {
            return aspect;
        }
        let asset = self.get_or_create_asset(path.clone());
        let key = (path, TypeId::of::<Aspect<T>>());
        let erased = {
            let mut aspects = self.aspects.write();
            Arc::clone(aspects.entry(key).or_insert_with(|| {
                let aspect: Arc<dyn Any + Send + Sync> = Arc::new(Aspect::<T>::new(asset));
                aspect
            }))
        };
        match erased.downcast::<Aspect<T>>() {
            Ok(aspect) => aspect,
            // Keys embed the aspect's TypeId, so the entry always has type Aspect<T>.
            Err(_) => unreachable!("aspect registry entry with mismatched type"),
        }
    }

    /// Number of registered assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    /// Whether no asset is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }

    /// Forget every asset and aspect. Outstanding handles stay usable.
    pub fn release_all(&self) {
        self.aspects.write().clear();
        self.assets.write().clear();
    }
}
