//! Async runtime adapters.

pub mod tokio_wait;

pub use tokio_wait::{wait_ready_async, wait_ready_timeout_async};
