//! Error types for backoff sequences.

use thiserror::Error;

/// Result type for backoff operations
pub type Result<T> = std::result::Result<T, BackoffError>;

/// Errors that can be signalled by a backoff sequence.
///
/// [`BackoffError::Exhausted`] is the normal end of a retry loop rather than a
/// fault. The iterator and stream adapters turn it into end-of-sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackoffError {
    /// The retry budget has been consumed since the last reset.
    #[error("backoff exhausted after {retries} of {max_retries} retries")]
    Exhausted {
        /// Completed steps at the time of the attempt
        retries: u32,
        /// Configured step budget
        max_retries: u32,
    },

    /// The wait was cancelled before it completed. The retry count is unchanged.
    #[error("backoff wait cancelled at retry {retries}")]
    Cancelled {
        /// Completed steps at the time of cancellation
        retries: u32,
    },

    /// The sequence was configured with values it cannot honour.
    #[error("invalid backoff configuration: {0}")]
    InvalidConfig(String),
}

impl BackoffError {
    /// Whether this error marks normal termination of the sequence.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Whether the wait was aborted by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
