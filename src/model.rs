//! Value types shared across components: [`Book`], [`UserSettings`],
//! [`ViewportSize`], [`SettingsKey`], [`PageRange`], and [`Meta`].

use std::path::PathBuf;

use crate::metrics::Metrics;

/// A book identified by the content hash of its raw bytes.
///
/// Immutable within a session except for `encoding_name`, which an
/// [`crate::encoding::EncodingResolver`] override may flip; `content_hash`
/// never changes because it is a digest of the raw bytes, not of the
/// decoded text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Book {
    /// Stable identifier, currently just `content_hash` hex-encoded.
    pub id: String,
    /// Presentation-only title; never affects pagination.
    pub title: String,
    /// Path to the source file.
    pub file_path: PathBuf,
    /// Lowercase-hex SHA-256 digest of the raw file bytes.
    pub content_hash: String,
    /// Size of the source file in bytes.
    pub file_size: u64,
    /// Name of the currently-resolved encoding (e.g. `"UTF-8"`, `"GBK"`).
    pub encoding_name: String,
}

/// Font, size, and spacing settings. Only [`UserSettings::fontName`]-affecting
/// fields participate in pagination; `speech_language_code`/`speech_rate` are
/// opaque to the engine and carried only for the caller's convenience.
#[derive(Clone, Debug, PartialEq)]
pub struct UserSettings {
    /// One of the six fixed faces, or `"System"`.
    pub font_name: String,
    /// Point size.
    pub font_size: f64,
    /// Display theme; affects rendering colour only, not line breaks.
    pub theme: Theme,
    /// Multiplier applied to the base line/paragraph spacing (see §4.8).
    pub line_spacing: f64,
    /// BCP-47 language tag for text-to-speech; opaque to pagination.
    pub speech_language_code: String,
    /// Speech playback rate; opaque to pagination.
    pub speech_rate: f64,
}

/// Reading theme. Affects colour only; never changes line breaks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Theme {
    /// Light background, system label colour foreground.
    Light,
    /// Dark background, white foreground.
    Dark,
    /// Sepia background, dark-brown foreground.
    Sepia,
}

impl Default for UserSettings {
    fn default() -> Self {
        UserSettings {
            font_name: "System".to_string(),
            font_size: 17.0,
            theme: Theme::Light,
            line_spacing: 1.0,
            speech_language_code: "en-US".to_string(),
            speech_rate: 1.0,
        }
    }
}

/// Full UI container size, before chrome and insets are removed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportSize {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

impl ViewportSize {
    /// Construct a viewport.
    pub fn new(width: f64, height: f64) -> Self {
        ViewportSize { width, height }
    }

    /// Drawable area after subtracting chrome and insets (no safety buffer;
    /// that is applied only inside the layout engine, see §4.3).
    pub fn drawable_size(&self, metrics: &Metrics) -> DrawableSize {
        let (width, height) = metrics.drawable_size(self.width, self.height);
        DrawableSize { width, height }
    }
}

/// The exact rectangle text is laid out in; smaller than the viewport by
/// chrome and insets.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawableSize {
    /// Width in points.
    pub width: f64,
    /// Height in points.
    pub height: f64,
}

/// Deterministic fingerprint of everything that affects pagination output
/// for a book: `contentHash, fontName, fontSize, lineSpacing,
/// floor(width)×floor(height), layoutVersion, encodingName`.
///
/// Encoding is included per the resolved Open Question in the design notes:
/// a forced re-decode produces different text and therefore different page
/// ranges even though `content_hash` (a digest of the raw bytes) is
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SettingsKey(String);

impl SettingsKey {
    /// Compute the fingerprint for a book, settings, viewport, and metrics.
    pub fn compute(
        book: &Book,
        settings: &UserSettings,
        viewport: ViewportSize,
        metrics: &Metrics,
    ) -> Self {
        SettingsKey(format!(
            "{}|{}|{}|{}|{}x{}|{}|{}",
            book.content_hash,
            settings.font_name,
            settings.font_size,
            settings.line_spacing,
            viewport.width.floor() as i64,
            viewport.height.floor() as i64,
            metrics.layout_version,
            book.encoding_name,
        ))
    }

    /// Borrow the fingerprint as a string for use as a cache key column.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SettingsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One page of text: a contiguous, non-overlapping UTF-16 code-unit range
/// within the canonical decoded text, plus the optional sliced content.
#[derive(Clone, Debug, PartialEq)]
pub struct PageRange {
    /// 1-based, dense page number within a `settings_key`.
    pub page_number: u64,
    /// UTF-16 code-unit offset where the page begins (inclusive).
    pub start_index: usize,
    /// UTF-16 code-unit offset where the page ends (exclusive).
    pub end_index: usize,
    /// The UTF-16 slice `text[start_index..end_index)`, if stored.
    pub content: Option<String>,
}

impl PageRange {
    /// Number of UTF-16 code units covered by this page.
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    /// True when the page covers zero code units (never produced in
    /// practice; kept for the `len`/`is_empty` pair's sake).
    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// Pagination progress metadata for a single `(book_hash, settings_key)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Meta {
    /// The settings fingerprint this metadata belongs to.
    pub settings_key: String,
    /// Highest UTF-16 offset fully paginated so far (monotonically
    /// non-decreasing within a job).
    pub last_processed_index: usize,
    /// Whether the paginator has reached the end of the text.
    pub is_complete: bool,
    /// Best current estimate of the total page count, once known exactly.
    pub total_pages: Option<u64>,
    /// Viewport this metadata was computed against.
    pub viewport: ViewportSize,
    /// Unix timestamp (seconds, fractional) of the last write.
    pub last_updated: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book() -> Book {
        Book {
            id: "abc".into(),
            title: "Sample".into(),
            file_path: PathBuf::from("/tmp/sample.txt"),
            content_hash: "abc123".into(),
            file_size: 10,
            encoding_name: "UTF-8".into(),
        }
    }

    #[test]
    fn settings_key_changes_with_font_size() {
        let book = sample_book();
        let settings = UserSettings::default();
        let viewport = ViewportSize::new(400.0, 800.0);
        let metrics = Metrics::default();
        let k1 = SettingsKey::compute(&book, &settings, viewport, &metrics);
        let mut settings2 = settings.clone();
        settings2.font_size = 22.0;
        let k2 = SettingsKey::compute(&book, &settings2, viewport, &metrics);
        assert_ne!(k1, k2);
    }

    #[test]
    fn settings_key_changes_with_encoding() {
        let mut book = sample_book();
        let settings = UserSettings::default();
        let viewport = ViewportSize::new(400.0, 800.0);
        let metrics = Metrics::default();
        let k1 = SettingsKey::compute(&book, &settings, viewport, &metrics);
        book.encoding_name = "GBK".into();
        let k2 = SettingsKey::compute(&book, &settings, viewport, &metrics);
        assert_ne!(k1, k2);
    }

    #[test]
    fn settings_key_stable_for_identical_inputs() {
        let book = sample_book();
        let settings = UserSettings::default();
        let viewport = ViewportSize::new(400.0, 800.0);
        let metrics = Metrics::default();
        let k1 = SettingsKey::compute(&book, &settings, viewport, &metrics);
        let k2 = SettingsKey::compute(&book, &settings, viewport, &metrics);
        assert_eq!(k1, k2);
    }

    #[test]
    fn page_range_len() {
        let page = PageRange {
            page_number: 1,
            start_index: 0,
            end_index: 3,
            content: Some("abc".into()),
        };
        assert_eq!(page.len(), 3);
        assert!(!page.is_empty());
    }
}
