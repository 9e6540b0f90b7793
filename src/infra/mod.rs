//! Infrastructure adapters: asset sources.

pub mod source;

pub use source::{AssetSource, DirectorySource, MemorySource};
