//! Centralized constants and geometry formulas shared by every component.
//!
//! Every number here contributes, directly or through [`Metrics::layout_version`],
//! to the settings fingerprint (see [`crate::model::SettingsKey`]). Changing any
//! constant without bumping `layoutVersion` would silently make an old cache
//! look valid for a layout it no longer matches.

/// Reserved chrome and safety-margin geometry, plus the tunables that decide
/// source-loading strategy and background-batch pacing.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Metrics {
    /// Height reserved for bottom chrome (page indicator, controls), in points.
    pub chrome_bottom_height: f64,
    /// Left/right inset, in points.
    pub horizontal_inset: f64,
    /// Top inset, in points.
    pub vertical_inset_top: f64,
    /// Bottom inset (above chrome), in points.
    pub vertical_inset_bottom: f64,
    /// Safety buffer subtracted from drawable height inside the layout engine only.
    pub safety_height_buffer: f64,
    /// Strict-less-than byte threshold for choosing a mapped vs. streamed source.
    pub memory_map_threshold: u64,
    /// Number of pages committed per background batch.
    pub batch_page_size: usize,
    /// Cooperative sleep between batches, in milliseconds.
    pub batch_yield_millis: u64,
    /// Layout algorithm/constant version, embedded in every settings key.
    pub layout_version: &'static str,
}

impl Metrics {
    /// The constants as specified; not expected to vary at runtime, but kept
    /// as a value (rather than bare `const` items) so tests can construct a
    /// scaled-down worker cadence without touching production defaults.
    pub const DEFAULT: Metrics = Metrics {
        chrome_bottom_height: 32.0,
        horizontal_inset: 16.0,
        vertical_inset_top: 16.0,
        vertical_inset_bottom: 16.0,
        safety_height_buffer: 2.0,
        memory_map_threshold: 1_610_612_736, // 1.5 GiB
        batch_page_size: 10,
        batch_yield_millis: 100,
        layout_version: "pad16v3",
    };

    /// Drawable area for a given viewport, after insets and chrome (no safety
    /// buffer — that is applied only inside the layout engine's own height
    /// measurement, per §4.3).
    pub fn drawable_size(&self, viewport_width: f64, viewport_height: f64) -> (f64, f64) {
        let width = viewport_width - 2.0 * self.horizontal_inset;
        let height = viewport_height
            - self.chrome_bottom_height
            - self.vertical_inset_top
            - self.vertical_inset_bottom;
        (width.max(0.0), height.max(0.0))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::DEFAULT
    }
}
