//! Errors reported by the scheduler's configuration surface.

use thiserror::Error;

/// Rejections raised before any task is started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The concurrency limit was zero. A `Gather` with no capacity could
    /// never admit a task, so this is refused synchronously instead of
    /// hanging the caller.
    #[error("concurrency limit must be at least 1")]
    InvalidLimit,
}
