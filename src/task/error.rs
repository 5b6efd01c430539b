//! Error types for the task module.

use thiserror::Error;

use crate::config::{MAX_THREAD_POOL_SIZE, MIN_THREAD_POOL_SIZE};

/// Errors raised while constructing a [`CopyOrchestrator`](super::CopyOrchestrator).
#[derive(Debug, Error)]
pub enum TaskError {
    /// Worker pool size outside the accepted range.
    #[error(
        "invalid thread pool size {value}: must be between {MIN_THREAD_POOL_SIZE} and {MAX_THREAD_POOL_SIZE}"
    )]
    InvalidPoolSize {
        /// The rejected value.
        value: usize,
    },

    /// Constructed outside a Tokio runtime.
    #[error("copy orchestrator requires a running Tokio runtime")]
    NoRuntime,
}
