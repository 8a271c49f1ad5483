//! Opens a book file as either a memory-mapped byte image or a streamed
//! handle, depending on size (C1).

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::EngineError;
use crate::metrics::Metrics;

/// A book's raw bytes, either mapped into the address space or held open
/// for chunked reads. Downstream code (C2 onward) never matches on which
/// variant it got beyond what [`TextSource::as_bytes`] /
/// [`TextSource::read_all`] expose.
pub enum TextSource {
    /// Zero-copy view over an OS-mapped file. Used for files strictly
    /// smaller than [`Metrics::memory_map_threshold`].
    Mapped(Mmap),
    /// A file handle read in bounded chunks. Used for files at or above the
    /// threshold, where mapping the whole file would pressure the address
    /// space unnecessarily.
    Streamed(File),
}

impl TextSource {
    /// Open `path`, choosing `Mapped` or `Streamed` by file size against
    /// `metrics.memory_map_threshold` (strict `<` for `Mapped`).
    pub fn open(path: &Path, metrics: &Metrics) -> Result<Self, EngineError> {
        let file = File::open(path).map_err(|e| EngineError::from_io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| EngineError::from_io(path, e))?
            .len();

        if len < metrics.memory_map_threshold {
            // Safety: the file is opened read-only for the lifetime of this
            // mapping and is not expected to be concurrently truncated by
            // another process; a race there would be a caller-level misuse,
            // not something this API can prevent on any platform.
            let mmap = unsafe { Mmap::map(&file) }.map_err(|e| EngineError::from_io(path, e))?;
            Ok(TextSource::Mapped(mmap))
        } else {
            Ok(TextSource::Streamed(file))
        }
    }

    /// Read the entire source into one `Vec<u8>`, regardless of variant.
    /// Used by [`crate::encoding::EncodingResolver`], which must see the
    /// complete byte stream to detect an encoding reliably.
    pub fn read_all(&mut self, path: &Path) -> Result<Vec<u8>, EngineError> {
        match self {
            TextSource::Mapped(mmap) => Ok(mmap[..].to_vec()),
            TextSource::Streamed(file) => {
                file.seek(SeekFrom::Start(0))
                    .map_err(|e| EngineError::from_io(path, e))?;
                let mut buf = Vec::new();
                file.read_to_end(&mut buf)
                    .map_err(|e| EngineError::from_io(path, e))?;
                Ok(buf)
            }
        }
    }

    /// Borrow the bytes directly when mapped; `None` for a streamed source,
    /// which has no single contiguous in-memory view.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            TextSource::Mapped(mmap) => Some(&mmap[..]),
            TextSource::Streamed(_) => None,
        }
    }

    /// `true` if this source is memory-mapped.
    pub fn is_mapped(&self) -> bool {
        matches!(self, TextSource::Mapped(_))
    }
}

/// Stat a path without opening it, for callers that only need
/// `(exists, size)` ahead of a full open (e.g. computing the content hash
/// while deciding the loading strategy).
pub fn file_size(path: &Path) -> Result<u64, EngineError> {
    std::fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| EngineError::from_io(path, e))
}

/// Resolve and validate that `path` is a readable regular file, translating
/// `io::Error` into the C1 error variants.
pub fn ensure_readable(path: &Path) -> Result<PathBuf, EngineError> {
    let canonical = path.to_path_buf();
    match std::fs::metadata(path) {
        Ok(_) => Ok(canonical),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(EngineError::FileNotFound { path: canonical })
        }
        Err(e) => Err(EngineError::from_io(path, e)),
    }
}
