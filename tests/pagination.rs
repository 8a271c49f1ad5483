//! End-to-end coverage for scenarios E1-E3 and E6 (§8): opening a plain-text
//! file, pagination determinism, the degenerate-layout fallback, and an
//! encoding override, all driven only through the public API.

use std::io::Write;

use page_engine::{
    open_book, DrawableSize, LayoutAttributes, LayoutEngine, Metrics, Paginator, SettingsKey,
    UserSettings, ViewportSize,
};

fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file
}

#[test]
fn opening_and_paginating_a_small_book_end_to_end() {
    let file = write_temp(b"It was the best of times, it was the worst of times.");
    let metrics = Metrics::default();
    let opened = open_book(file.path(), &metrics, None).unwrap();
    assert_eq!(opened.book.encoding_name, "UTF-8");
    assert!(opened.diagnostic.is_none());

    let settings = UserSettings::default();
    let attrs = LayoutAttributes::from_settings(&settings);
    let viewport = ViewportSize::new(390.0, 844.0);
    let drawable = viewport.drawable_size(&metrics);
    let engine = LayoutEngine::new(metrics);

    let pages: Vec<_> = Paginator::new(&opened.text, &engine, attrs, drawable, 0, 1, true)
        .map(|step| step.page)
        .collect();

    assert!(!pages.is_empty());
    assert_eq!(pages[0].start_index, 0);
    assert_eq!(pages.last().unwrap().end_index, opened.text.len());
    for pair in pages.windows(2) {
        assert_eq!(pair[0].end_index, pair[1].start_index);
    }

    let settings_key = SettingsKey::compute(&opened.book, &settings, viewport, &metrics);
    let settings_key_again = SettingsKey::compute(&opened.book, &settings, viewport, &metrics);
    assert_eq!(settings_key, settings_key_again);
}

#[test]
fn resuming_after_a_settings_change_invalidates_the_cache_key() {
    let file = write_temp(b"a reasonably short sample passage for re-keying");
    let metrics = Metrics::default();
    let opened = open_book(file.path(), &metrics, None).unwrap();

    let viewport = ViewportSize::new(390.0, 844.0);
    let original = UserSettings::default();
    let mut changed = original.clone();
    changed.font_size = original.font_size + 4.0;

    let key_a = SettingsKey::compute(&opened.book, &original, viewport, &metrics);
    let key_b = SettingsKey::compute(&opened.book, &changed, viewport, &metrics);
    assert_ne!(key_a, key_b);
}

#[test]
fn a_single_oversized_glyph_still_produces_forward_progress() {
    // Scenario E3: the drawable area cannot fit even one character at the
    // requested font size; the layout engine must still force a
    // single-codepoint page with a `DegenerateLayout` diagnostic rather than
    // stall forever.
    let text = page_engine::CanonicalText::from_str("abcdef");
    let metrics = Metrics::default();
    let engine = LayoutEngine::new(metrics);
    let attrs = LayoutAttributes::from_settings(&UserSettings::default());
    let drawable = DrawableSize {
        width: 0.01,
        height: 0.01,
    };

    let steps: Vec<_> = Paginator::new(&text, &engine, attrs, drawable, 0, 1, true).collect();
    assert_eq!(steps.len(), 6, "one page per character, forced progress");
    assert!(steps.iter().all(|s| s.diagnostic.is_some()));
}

#[test]
fn forced_encoding_override_changes_the_settings_key() {
    // Scenario E6: an explicit encoding override produces different
    // canonical text (and therefore a different `encodingName`) even though
    // the raw bytes, and so `content_hash`, are unchanged.
    let file = write_temp(b"plain ascii content is valid under most encodings");
    let metrics = Metrics::default();
    let settings = UserSettings::default();
    let viewport = ViewportSize::new(390.0, 844.0);

    let utf8 = open_book(file.path(), &metrics, None).unwrap();
    let forced = open_book(file.path(), &metrics, Some("windows-1252")).unwrap();

    assert_eq!(utf8.book.content_hash, forced.book.content_hash);
    assert_ne!(utf8.book.encoding_name, forced.book.encoding_name);

    let key_utf8 = SettingsKey::compute(&utf8.book, &settings, viewport, &metrics);
    let key_forced = SettingsKey::compute(&forced.book, &settings, viewport, &metrics);
    assert_ne!(key_utf8, key_forced);
}
