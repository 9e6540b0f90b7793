//! Directory-backed asset source.

use std::io;
use std::path::{Path, PathBuf};

use super::AssetSource;
use crate::core::asset::LogicPath;

/// Reads resources from files below a root directory.
///
/// Logical paths are normalized, so `..` segments never escape the root.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    /// Serve files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a logical path.
    #[must_use]
    pub fn real_path(&self, path: &LogicPath) -> PathBuf {
        self.root.join(path.relative())
    }
}

impl AssetSource for DirectorySource {
    fn read(&self, path: &LogicPath) -> io::Result<Vec<u8>> {
        std::fs::read(self.real_path(path))
    }

    fn exists(&self, path: &LogicPath) -> bool {
        self.real_path(path).is_file()
    }
}
