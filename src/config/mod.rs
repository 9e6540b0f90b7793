//! Configuration models for the loader scheduler.

pub mod loader;

pub use loader::{DependencyPolicy, LoaderConfig, MAX_LOADER_THREADS};
