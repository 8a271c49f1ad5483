//! End-to-end coverage for scenarios E4 and E5 (§8): incremental commits
//! becoming visible as the background worker progresses, and a mid-read
//! settings change cancelling the in-flight job and restarting pagination
//! under the new key.

use std::io::Write;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use page_engine::{Metrics, UserSettings, ViewportSize};
use page_engine_store::CacheStore;
use page_engine_session::{ReaderSession, SessionState};

fn tiny_metrics() -> Metrics {
    Metrics {
        batch_page_size: 2,
        batch_yield_millis: 1,
        ..Metrics::default()
    }
}

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn incremental_commits_become_visible_before_completion() {
    let file = write_temp(&"the quick brown fox jumps over the lazy dog. ".repeat(40));
    let store = Arc::new(CacheStore::open_in_memory().unwrap());
    let metrics = tiny_metrics();

    let mut session = ReaderSession::open(
        file.path(),
        metrics,
        UserSettings::default(),
        ViewportSize::new(390.0, 844.0),
        store,
    )
    .unwrap();

    let mut saw_partial_progress = false;
    for _ in 0..300 {
        let count = session.page_count();
        if count > 0 && session.state() != SessionState::Complete {
            saw_partial_progress = true;
        }
        if session.state() == SessionState::Complete {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }

    assert!(saw_partial_progress, "never observed an incremental commit before completion");
    assert_eq!(session.state(), SessionState::Complete);
    let page = session.page_content(1).unwrap();
    assert!(!page.text.is_empty());
    assert!(page.is_authoritative);
}

#[test]
fn a_mid_read_settings_change_restarts_pagination_under_a_new_key() {
    let file = write_temp(&"lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(40));
    let store = Arc::new(CacheStore::open_in_memory().unwrap());
    let metrics = tiny_metrics();

    let mut session = ReaderSession::open(
        file.path(),
        metrics,
        UserSettings::default(),
        ViewportSize::new(390.0, 844.0),
        store,
    )
    .unwrap();

    // Let a little pagination happen under the original key.
    for _ in 0..20 {
        session.poll_events();
        thread::sleep(Duration::from_millis(5));
    }

    let mut bigger = UserSettings::default();
    bigger.font_size += 10.0;
    session.update_settings(bigger);

    // The new key starts Loading again; it must still converge to Complete.
    let mut reached_complete = false;
    for _ in 0..300 {
        if session.state() == SessionState::Complete {
            reached_complete = true;
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert!(reached_complete, "pagination never completed under the new settings key");
}
