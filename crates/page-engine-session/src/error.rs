//! Error taxonomy for the background worker and reader session facade.

use std::fmt;

use page_engine::EngineError;
use page_engine_store::StoreError;

/// Errors surfaced by [`crate::BackgroundWorker`] and [`crate::ReaderSession`].
#[derive(Debug)]
#[non_exhaustive]
pub enum SessionError {
    /// Propagated from source loading, encoding, or layout (C1-C4).
    Engine(EngineError),
    /// Propagated from the cache store (C5).
    Store(StoreError),
    /// The job was cancelled before completion. Expected, not a failure;
    /// callers should not surface this as an error to the end user.
    Cancelled,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Engine(err) => write!(f, "{err}"),
            SessionError::Store(err) => write!(f, "{err}"),
            SessionError::Cancelled => write!(f, "pagination job cancelled"),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<EngineError> for SessionError {
    fn from(err: EngineError) -> Self {
        SessionError::Engine(err)
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        SessionError::Store(err)
    }
}

impl SessionError {
    /// True for errors that should not abort a job's commit of prior
    /// batches: `Cancelled` is expected; diagnostics from the engine still
    /// allow pagination to advance.
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Cancelled => false,
            SessionError::Engine(err) => !err.is_diagnostic(),
            SessionError::Store(err) => !err.is_busy(),
        }
    }
}
