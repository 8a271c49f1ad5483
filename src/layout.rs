//! Pure function from `(attributedText, startIndex, drawableSize)` to the
//! UTF-16 length of the next page (C3).
//!
//! There is no real font-metrics backend in a headless engine, so — like
//! the teacher's own layout engine, which measures text with a
//! `width_factor` heuristic rather than a platform font rasterizer — line
//! breaking here uses an approximate, but entirely deterministic, per-glyph
//! width model. What matters for conformance is not the exact pixel model
//! but that the *same* model is used every time the engine is asked to
//! paginate, which is what every testable property in §8 actually requires.

use crate::error::EngineError;
use crate::metrics::Metrics;
use crate::model::{DrawableSize, Theme, UserSettings};
use crate::text::CanonicalText;

/// The subset of `UserSettings` that affects pagination, materialized once
/// per settings key rather than re-derived on every call (mirrors the
/// teacher's split between user-facing style and resolved layout numbers).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutAttributes {
    /// Point size.
    pub font_size: f64,
    /// `4 × settings.lineSpacing`, added atop the base line height.
    pub line_spacing_px: f64,
    /// `8 × settings.lineSpacing`, added after a paragraph break (`\n`).
    pub paragraph_spacing_px: f64,
}

impl LayoutAttributes {
    /// Derive the layout-affecting attributes from `UserSettings`, per §4.8.
    /// `font_name` and `theme` are intentionally absent: the former only
    /// changes glyph shapes (folded into the heuristic width factor,
    /// constant here), the latter only changes colour.
    pub fn from_settings(settings: &UserSettings) -> Self {
        LayoutAttributes {
            font_size: settings.font_size,
            line_spacing_px: 4.0 * settings.line_spacing,
            paragraph_spacing_px: 8.0 * settings.line_spacing,
        }
    }

    /// Heuristic per-character width used by the layout engine; exposed so
    /// tests (in this crate and downstream) can size a drawable area to fit
    /// an exact, known number of characters.
    pub fn char_width_px(&self) -> f64 {
        self.font_size * 0.55
    }

    /// Heuristic line height (including `line_spacing_px`) used by the
    /// layout engine; see [`Self::char_width_px`] for why this is public.
    pub fn line_height_px(&self) -> f64 {
        self.font_size * 1.2 + self.line_spacing_px
    }
}

/// Result of measuring one page's worth of content starting at an index.
#[derive(Debug)]
pub struct LayoutResult {
    /// Number of UTF-16 code units, starting at the requested `start_index`,
    /// that fit within the drawable area.
    pub length: usize,
    /// Set when the layout had to force a single-codepoint page because
    /// nothing else fit.
    pub diagnostic: Option<EngineError>,
}

/// Computes, for a given text/attributes/drawable-area triple, the UTF-16
/// length of the next page.
pub struct LayoutEngine {
    metrics: Metrics,
}

impl LayoutEngine {
    /// Build an engine bound to a fixed set of geometry constants.
    pub fn new(metrics: Metrics) -> Self {
        LayoutEngine { metrics }
    }

    /// Measure how much of `text`, starting at `start_index`, fits within
    /// `drawable` when typeset with `attrs`. See module docs for the
    /// conservative-by-design rationale of the safety buffer.
    pub fn measure_page(
        &self,
        text: &CanonicalText,
        start_index: usize,
        attrs: LayoutAttributes,
        drawable: DrawableSize,
    ) -> LayoutResult {
        if start_index >= text.len() {
            return LayoutResult {
                length: 0,
                diagnostic: None,
            };
        }

        let content_width = drawable.width;
        let content_height = (drawable.height - self.metrics.safety_height_buffer).max(0.0);
        let char_width = attrs.char_width_px();
        let line_height = attrs.line_height_px();

        let scalars = decode_scalars(&text.units()[start_index..]);

        let mut consumed_units = 0usize;
        let mut cursor_y = line_height; // height used once the first line is placed
        let mut line_width_used = 0.0f64;
        let mut any_committed = false;

        for (unit_len, ch) in &scalars {
            if *ch == '\n' {
                if any_committed {
                    let projected = cursor_y + attrs.paragraph_spacing_px;
                    if projected > content_height {
                        break;
                    }
                    cursor_y = projected;
                }
                line_width_used = 0.0;
                consumed_units += unit_len;
                any_committed = true;
                continue;
            }

            if line_width_used + char_width > content_width && line_width_used > 0.0 {
                let projected = cursor_y + line_height;
                if projected > content_height {
                    break;
                }
                cursor_y = projected;
                line_width_used = 0.0;
            }

            if cursor_y > content_height {
                break;
            }

            line_width_used += char_width;
            consumed_units += unit_len;
            any_committed = true;
        }

        if consumed_units == 0 {
            let forced = scalars.first().map(|(len, _)| *len).unwrap_or(1);
            return LayoutResult {
                length: forced,
                diagnostic: Some(EngineError::DegenerateLayout { start_index }),
            };
        }

        LayoutResult {
            length: consumed_units,
            diagnostic: None,
        }
    }
}

/// Decode UTF-16 code units into `(unit_length, scalar)` pairs so the caller
/// can accumulate whole scalars — this is what guarantees a measured length
/// never splits a surrogate pair, without any separate rounding step.
fn decode_scalars(units: &[u16]) -> Vec<(usize, char)> {
    let mut out = Vec::with_capacity(units.len());
    for result in char::decode_utf16(units.iter().copied()) {
        match result {
            Ok(ch) => out.push((ch.len_utf16(), ch)),
            Err(_) => out.push((1, '\u{FFFD}')),
        }
    }
    out
}

impl Theme {
    /// Placeholder hook for a future renderer: theme never changes line
    /// breaks, only foreground colour, so it carries no layout-affecting
    /// data here.
    pub fn affects_layout() -> bool {
        false
    }
}
