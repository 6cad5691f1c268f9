//! Errors raised synchronously when a reader is driven incorrectly.

/// A lifecycle request that is not valid in the reader's current state.
///
/// These indicate a bug in the reader's owner, not a runtime condition, and leave the reader
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    /// `resume` was called on a reader that was never started.
    #[error("reader for stream '{0}' has not been started")]
    NotStarted(String),
    /// `start` was called more than once.
    #[error("reader for stream '{0}' has already been started")]
    AlreadyStarted(String),
    /// `resume` was called on a reader that is not paused.
    #[error("reader for stream '{0}' is not paused")]
    NotPaused(String),
}
