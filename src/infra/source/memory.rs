//! In-memory asset source for tests and embedded data.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;

use super::AssetSource;
use crate::core::asset::LogicPath;

/// Asset source backed by a map of logical paths to bytes.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: RwLock<HashMap<LogicPath, Arc<[u8]>>>,
}

impl MemorySource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with_file(self, path: impl Into<LogicPath>, bytes: impl AsRef<[u8]>) -> Self {
        self.insert(path, bytes);
        self
    }

    /// Add or replace a resource.
    pub fn insert(&self, path: impl Into<LogicPath>, bytes: impl AsRef<[u8]>) {
        self.files
            .write()
            .insert(path.into(), Arc::from(bytes.as_ref()));
    }

    /// Remove a resource, returning whether it existed.
    pub fn remove(&self, path: &LogicPath) -> bool {
        self.files.write().remove(path).is_some()
    }

    /// Number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    /// Whether no resource is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

impl AssetSource for MemorySource {
    fn read(&self, path: &LogicPath) -> io::Result<Vec<u8>> {
        self.files
            .read()
            .get(path)
            .map(|bytes| bytes.to_vec())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_string()))
    }

    fn exists(&self, path: &LogicPath) -> bool {
        self.files.read().contains_key(path)
    }
}
