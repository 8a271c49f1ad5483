//! Error taxonomy for the durable cache store.

use std::fmt;

/// Errors produced while opening or operating the SQLite-backed cache store.
#[derive(Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not acquire the writer lock within the busy timeout,
    /// even after one retry with back-off. Transient; the caller may retry
    /// the whole operation later.
    StoreBusy {
        /// Total time spent waiting, in milliseconds.
        waited_millis: u64,
    },
    /// The on-disk database is unreadable or fails a sanity check that
    /// `PRAGMA integrity_check` or schema migration would otherwise catch.
    StoreCorrupt {
        /// Description of what was wrong.
        message: String,
    },
    /// Any other underlying SQLite error, preserved verbatim.
    Sqlite {
        /// The underlying error, rendered to a string (`rusqlite::Error` is
        /// not `Clone`, so it cannot be stored directly alongside `Debug`).
        source: String,
    },
    /// Failed to resolve or create the user-data directory for the cache
    /// database file.
    CacheDirUnavailable {
        /// What went wrong resolving the directory.
        message: String,
    },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::StoreBusy { waited_millis } => {
                write!(f, "store busy after waiting {waited_millis}ms")
            }
            StoreError::StoreCorrupt { message } => write!(f, "store corrupt: {message}"),
            StoreError::Sqlite { source } => write!(f, "sqlite error: {source}"),
            StoreError::CacheDirUnavailable { message } => {
                write!(f, "cache directory unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(sqlite_err, _)
                if sqlite_err.code == rusqlite::ErrorCode::DatabaseBusy =>
            {
                StoreError::StoreBusy { waited_millis: 0 }
            }
            rusqlite::Error::SqliteFailure(sqlite_err, _)
                if sqlite_err.code == rusqlite::ErrorCode::DatabaseCorrupt =>
            {
                StoreError::StoreCorrupt {
                    message: err.to_string(),
                }
            }
            _ => StoreError::Sqlite {
                source: err.to_string(),
            },
        }
    }
}

impl StoreError {
    /// True for `StoreBusy`, the one error kind this crate's callers retry.
    pub fn is_busy(&self) -> bool {
        matches!(self, StoreError::StoreBusy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_is_recognized() {
        let err = StoreError::StoreBusy { waited_millis: 3000 };
        assert!(err.is_busy());
        assert!(!StoreError::StoreCorrupt {
            message: "x".into()
        }
        .is_busy());
    }
}
