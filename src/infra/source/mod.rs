//! Asset sources: where load phases read resource bytes from.

pub mod directory;
pub mod memory;

use std::io;

use crate::core::asset::LogicPath;

pub use directory::DirectorySource;
pub use memory::MemorySource;

/// Byte provider for logical paths.
pub trait AssetSource: Send + Sync {
    /// Read the whole resource at `path`.
    ///
    /// # Errors
    ///
    /// `io::ErrorKind::NotFound` when the resource does not exist, any other
    /// I/O error when it exists but cannot be read.
    fn read(&self, path: &LogicPath) -> io::Result<Vec<u8>>;

    /// Whether a resource exists at `path`.
    fn exists(&self, path: &LogicPath) -> bool {
        self.read(path).is_ok()
    }
}
