//! Orchestrates C1 (`SourceLoader`) and C2 (`EncodingResolver`) into a
//! single "open a book" operation, producing the `Book` identity plus its
//! canonical decoded text.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::encoding::EncodingResolver;
use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::model::Book;
use crate::source::{file_size, TextSource};
use crate::text::CanonicalText;

/// Outcome of opening a book file: its identity, canonical text, and any
/// non-fatal decoding diagnostic.
pub struct OpenedBook {
    /// Book identity (content hash, encoding, size).
    pub book: Book,
    /// Canonical decoded text.
    pub text: CanonicalText,
    /// Set when decoding fell back to lossy UTF-8.
    pub diagnostic: Option<EngineError>,
}

/// Open `path`, choosing a mapped or streamed source per `metrics`, hash
/// the raw bytes, and resolve an encoding (forced, if `forced_encoding` is
/// given).
pub fn open_book(
    path: &Path,
    metrics: &Metrics,
    forced_encoding: Option<&str>,
) -> Result<OpenedBook, EngineError> {
    let file_size_bytes = file_size(path)?;
    let mut source = TextSource::open(path, metrics)?;
    let bytes = source.read_all(path)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let content_hash = hex::encode(hasher.finalize());

    let outcome = EncodingResolver::resolve(&bytes, forced_encoding)?;

    let title = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("untitled")
        .to_string();

    let book = Book {
        id: content_hash.clone(),
        title,
        file_path: path.to_path_buf(),
        content_hash,
        file_size: file_size_bytes,
        encoding_name: outcome.encoding_name,
    };

    Ok(OpenedBook {
        book,
        text: outcome.text,
        diagnostic: outcome.diagnostic,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn opening_a_plain_ascii_file_produces_stable_identity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello world").unwrap();
        let metrics = Metrics::default();
        let opened = open_book(file.path(), &metrics, None).unwrap();
        assert_eq!(opened.book.encoding_name, "UTF-8");
        assert_eq!(opened.book.file_size, 11);
        assert_eq!(opened.text.len(), 11);
        // content hash is a 64-char lowercase hex SHA-256 digest
        assert_eq!(opened.book.content_hash.len(), 64);
        assert!(opened
            .book
            .content_hash
            .chars()
            .all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn forced_unsupported_encoding_fails_fast() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello").unwrap();
        let metrics = Metrics::default();
        let err = open_book(file.path(), &metrics, Some("not-an-encoding")).unwrap_err();
        assert!(matches!(err, EngineError::EncodingUnsupported { .. }));
    }
}
