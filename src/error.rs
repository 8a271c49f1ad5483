//! Unified error taxonomy for `page_engine`.
//!
//! `EngineError` covers the source-loading, encoding, layout, and pagination
//! surface (C1-C4). The cache store and session crates define their own
//! error types and convert into or wrap this one, rather than this crate
//! depending on `rusqlite` directly.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors produced by source loading, encoding resolution, and layout.
#[derive(Debug)]
#[non_exhaustive]
pub enum EngineError {
    /// The requested file does not exist.
    FileNotFound {
        /// Path that was requested.
        path: PathBuf,
    },
    /// The process lacks permission to read the file.
    AccessDenied {
        /// Path that was requested.
        path: PathBuf,
    },
    /// An I/O error occurred while reading or mapping the file.
    ReadFailed {
        /// Path being read.
        path: PathBuf,
        /// Underlying I/O error, rendered to a string (`io::Error` is not `Clone`).
        source: String,
    },
    /// No encoding in the detection chain decoded the bytes cleanly, and no
    /// override was supplied; lossy UTF-8 was used instead. Non-fatal.
    DecodingLossy {
        /// Number of replacement characters inserted.
        replacement_count: usize,
    },
    /// A forced encoding override is not one of the encodings this resolver
    /// knows how to decode.
    EncodingUnsupported {
        /// The requested encoding label.
        requested: String,
    },
    /// The layout engine could not fit a single character in the drawable
    /// area and fell back to a forced one-codepoint page. Non-fatal.
    DegenerateLayout {
        /// UTF-16 offset at which the degenerate page begins.
        start_index: usize,
    },
    /// An internal invariant was violated; indicates a bug rather than bad
    /// input. Surfaced as a non-fatal error to the caller, who should stop
    /// the current job.
    InternalInvariant {
        /// What was expected to hold.
        message: String,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::FileNotFound { path } => {
                write!(f, "file not found: {}", path.display())
            }
            EngineError::AccessDenied { path } => {
                write!(f, "access denied: {}", path.display())
            }
            EngineError::ReadFailed { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            EngineError::DecodingLossy { replacement_count } => write!(
                f,
                "decoded with {replacement_count} lossy replacement character(s)"
            ),
            EngineError::EncodingUnsupported { requested } => {
                write!(f, "unsupported encoding override: {requested}")
            }
            EngineError::DegenerateLayout { start_index } => write!(
                f,
                "layout could not fit any content at index {start_index}; forced single-codepoint page"
            ),
            EngineError::InternalInvariant { message } => {
                write!(f, "internal invariant violated: {message}")
            }
        }
    }
}

impl std::error::Error for EngineError {}

impl EngineError {
    /// Classify an [`io::Error`] encountered while opening or reading `path`.
    pub fn from_io(path: &std::path::Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => EngineError::FileNotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => EngineError::AccessDenied {
                path: path.to_path_buf(),
            },
            other => EngineError::ReadFailed {
                path: path.to_path_buf(),
                source: other.to_string(),
            },
        }
    }

    /// True for errors that are diagnostics rather than job-ending failures
    /// (`DecodingLossy`, `DegenerateLayout`): pagination must still advance.
    pub fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            EngineError::DecodingLossy { .. } | EngineError::DegenerateLayout { .. }
        )
    }
}
