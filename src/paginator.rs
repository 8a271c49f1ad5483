//! Lazy, finite, forward-only sequence of [`PageRange`] values (C4).

use crate::layout::{LayoutAttributes, LayoutEngine};
use crate::model::{DrawableSize, PageRange};
use crate::text::CanonicalText;
use crate::EngineError;

/// One step of pagination: the page itself, plus any non-fatal diagnostic
/// the layout engine raised while producing it (`DegenerateLayout`).
#[derive(Debug)]
pub struct PaginatorStep {
    /// The produced page.
    pub page: PageRange,
    /// Set when [`crate::layout::LayoutEngine`] had to force a
    /// single-codepoint page.
    pub diagnostic: Option<EngineError>,
}

/// Iterates the [`LayoutEngine`] from a start index, producing the ordered
/// page list. Deterministic: identical `(text, attrs, drawable, start)`
/// inputs always yield a byte-identical sequence, since each step depends
/// only on the immutable text and the previous step's `end_index`.
pub struct Paginator<'a> {
    text: &'a CanonicalText,
    engine: &'a LayoutEngine,
    attrs: LayoutAttributes,
    drawable: DrawableSize,
    next_index: usize,
    next_page_number: u64,
    store_content: bool,
}

impl<'a> Paginator<'a> {
    /// Build a paginator that starts producing pages at `start_index`,
    /// numbering the first produced page `start_page_number`. Resuming a
    /// job passes the `lastProcessedIndex`/`page_count + 1` pair read back
    /// from `CacheStore::fetchMeta`.
    pub fn new(
        text: &'a CanonicalText,
        engine: &'a LayoutEngine,
        attrs: LayoutAttributes,
        drawable: DrawableSize,
        start_index: usize,
        start_page_number: u64,
        store_content: bool,
    ) -> Self {
        Paginator {
            text,
            engine,
            attrs,
            drawable,
            next_index: start_index,
            next_page_number: start_page_number,
            store_content,
        }
    }

    /// The UTF-16 offset the next produced page would start at.
    pub fn cursor(&self) -> usize {
        self.next_index
    }
}

impl<'a> Iterator for Paginator<'a> {
    type Item = PaginatorStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.text.len() {
            return None;
        }

        let result = self
            .engine
            .measure_page(self.text, self.next_index, self.attrs, self.drawable);

        let start_index = self.next_index;
        let end_index = start_index + result.length;
        let content = if self.store_content {
            Some(self.text.slice(start_index, end_index))
        } else {
            None
        };

        let page = PageRange {
            page_number: self.next_page_number,
            start_index,
            end_index,
            content,
        };

        self.next_index = end_index;
        self.next_page_number += 1;

        Some(PaginatorStep {
            page,
            diagnostic: result.diagnostic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use crate::model::UserSettings;

    fn fits_exactly_three() -> (CanonicalText, LayoutEngine, LayoutAttributes, DrawableSize) {
        // A drawable area and font sized so that exactly 3 UTF-16 code
        // units fit per page of plain ASCII text, mirroring scenario E1.
        let text = CanonicalText::from_str("abcdefghij");
        let metrics = Metrics::default();
        let engine = LayoutEngine::new(metrics);
        let settings = UserSettings::default();
        let attrs = LayoutAttributes::from_settings(&settings);
        // width fits exactly 3 chars at char_width = font_size * 0.55;
        // height fits exactly 1 line.
        let char_width = attrs.char_width_px();
        let drawable = DrawableSize {
            width: char_width * 3.0,
            height: attrs.line_height_px() + Metrics::default().safety_height_buffer,
        };
        (text, engine, attrs, drawable)
    }

    #[test]
    fn e1_tiny_deterministic_sample() {
        let (text, engine, attrs, drawable) = fits_exactly_three();
        let paginator = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true);
        let pages: Vec<_> = paginator.map(|step| step.page).collect();
        assert_eq!(pages.len(), 4);
        assert_eq!(pages[0].start_index, 0);
        assert_eq!(pages[0].end_index, 3);
        assert_eq!(pages[0].content.as_deref(), Some("abc"));
        assert_eq!(pages[3].start_index, 9);
        assert_eq!(pages[3].end_index, 10);
        assert_eq!(pages[3].content.as_deref(), Some("j"));
    }

    #[test]
    fn e2_empty_text_produces_no_pages() {
        let text = CanonicalText::from_str("");
        let engine = LayoutEngine::new(Metrics::default());
        let attrs = LayoutAttributes::from_settings(&UserSettings::default());
        let drawable = DrawableSize {
            width: 300.0,
            height: 300.0,
        };
        let paginator = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true);
        let pages: Vec<_> = paginator.map(|step| step.page).collect();
        assert!(pages.is_empty());
    }

    #[test]
    fn pages_are_contiguous_and_dense() {
        let text = CanonicalText::from_str(&"the quick brown fox jumps ".repeat(20));
        let engine = LayoutEngine::new(Metrics::default());
        let attrs = LayoutAttributes::from_settings(&UserSettings::default());
        let drawable = DrawableSize {
            width: 320.0,
            height: 400.0,
        };
        let paginator = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true);
        let pages: Vec<_> = paginator.map(|step| step.page).collect();
        for pair in pages.windows(2) {
            assert_eq!(pair[0].end_index, pair[1].start_index);
            assert_eq!(pair[0].page_number + 1, pair[1].page_number);
        }
        assert_eq!(pages[0].start_index, 0);
        assert_eq!(pages.last().unwrap().end_index, text.len());
    }

    #[test]
    fn re_running_is_deterministic() {
        let text = CanonicalText::from_str(&"the quick brown fox jumps ".repeat(20));
        let engine = LayoutEngine::new(Metrics::default());
        let attrs = LayoutAttributes::from_settings(&UserSettings::default());
        let drawable = DrawableSize {
            width: 320.0,
            height: 400.0,
        };
        let first: Vec<_> = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true)
            .map(|s| s.page)
            .collect();
        let second: Vec<_> = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true)
            .map(|s| s.page)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn resuming_from_an_offset_matches_a_full_run() {
        let text = CanonicalText::from_str(&"the quick brown fox jumps ".repeat(20));
        let engine = LayoutEngine::new(Metrics::default());
        let attrs = LayoutAttributes::from_settings(&UserSettings::default());
        let drawable = DrawableSize {
            width: 320.0,
            height: 400.0,
        };
        let full: Vec<_> = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true)
            .map(|s| s.page)
            .collect();
        let split_point = full[2].end_index;
        let resumed: Vec<_> = Paginator::new(&text, &engine, attrs, drawable, split_point, 4, true)
            .map(|s| s.page)
            .collect();
        assert_eq!(full[3..], resumed[..]);
    }
}
