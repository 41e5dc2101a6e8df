use std::error::Error;

/// Boxed error raised by a sequence while producing a step.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = TaskError> = std::result::Result<T, E>;

/// Errors surfaced by the stepping operations.
///
/// Cancellation is not represented here: a cancelled task simply reports
/// itself as done.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// The task was stepped after [`dispose`](crate::SyncTask::dispose).
    #[error("task was stepped after it was disposed")]
    Disposed,

    /// A previous step failed; the sequence was dropped and cannot resume.
    #[error("task sequence failed on an earlier step and cannot be resumed")]
    Faulted,

    /// An async step future was dropped before it resolved.
    #[error("an in-flight step was dropped before it resolved")]
    Abandoned,

    /// The sequence itself failed while producing a step.
    #[error("sequence step failed: {0}")]
    Step(#[source] BoxError),
}

impl TaskError {
    /// Wraps a producer failure.
    ///
    /// ```rust
    /// use framestep::TaskError;
    ///
    /// let err = TaskError::step("asset missing");
    /// assert_eq!(err.to_string(), "sequence step failed: asset missing");
    /// ```
    pub fn step(error: impl Into<BoxError>) -> Self {
        Self::Step(error.into())
    }
}
