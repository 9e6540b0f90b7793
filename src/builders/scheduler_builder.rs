//! Builder to construct a [`Scheduler`] from configuration.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::config::LoaderConfig;
use crate::core::asset::AssetRegistry;
use crate::core::audit::EventSink;
use crate::core::error::SchedulerError;
use crate::core::scheduler::Scheduler;
use crate::infra::source::{AssetSource, DirectorySource, MemorySource};

/// Assembles a scheduler from a [`LoaderConfig`] plus optional collaborators.
///
/// Without an explicit source, files are read from `config.asset_root` when it
/// is set; otherwise the scheduler starts with an empty [`MemorySource`].
pub struct SchedulerBuilder {
    config: LoaderConfig,
    registry: Option<Arc<AssetRegistry>>,
    source: Option<Arc<dyn AssetSource>>,
    events: Option<Arc<dyn EventSink>>,
}

impl fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("config", &self.config)
            .field("custom_registry", &self.registry.is_some())
            .field("custom_source", &self.source.is_some())
            .field("event_sink", &self.events.is_some())
            .finish()
    }
}

impl SchedulerBuilder {
    /// Start from `config`.
    #[must_use]
    pub const fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            registry: None,
            source: None,
            events: None,
        }
    }

    /// Share an existing registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<AssetRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Read resource bytes from `source`.
    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn AssetSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Record job lifecycle events into `sink`.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = Some(sink);
        self
    }

    /// Configuration the scheduler will be built with.
    #[must_use]
    pub const fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Build the scheduler on the current thread, which becomes the
    /// designated thread, and start its workers.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidConfig`] if the configuration does not
    /// validate, [`SchedulerError::Spawn`] if a worker thread cannot start.
    pub fn build(self) -> Result<Scheduler, SchedulerError> {
        let source: Arc<dyn AssetSource> = match (self.source, &self.config.asset_root) {
            (Some(source), _) => source,
            (None, Some(root)) => {
                debug!(root = %root.display(), "using directory asset source");
                Arc::new(DirectorySource::new(root.clone()))
            }
            (None, None) => Arc::new(MemorySource::new()),
        };
        let registry = self.registry.unwrap_or_default();
        Scheduler::from_parts(self.config, registry, source, self.events)
    }
}
