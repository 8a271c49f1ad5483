//! The durable, embedded page cache (C5).
//!
//! One `rusqlite::Connection` per [`CacheStore`], guarded by an internal
//! mutex for the writer path. `fetch_page`/`fetch_meta` borrow the same
//! connection under the mutex rather than opening a second one — SQLite's
//! WAL mode would allow a separate reader connection to run lock-free
//! against the writer, but a single embedded-store process is simplest
//! served by one connection; see `DESIGN.md` for the tradeoff.

use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use page_engine::{Meta, PageRange, ViewportSize};
use rusqlite::{params, Connection, OptionalExtension};

use crate::config::StoreConfig;
use crate::error::StoreError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS page_cache (
  book_hash    TEXT    NOT NULL,
  settings_key TEXT    NOT NULL,
  page_number  INTEGER NOT NULL,
  start_index  INTEGER NOT NULL,
  end_index    INTEGER NOT NULL,
  content      TEXT,
  last_updated REAL    NOT NULL,
  PRIMARY KEY (book_hash, settings_key, page_number)
);

CREATE TABLE IF NOT EXISTS page_meta (
  book_hash            TEXT    NOT NULL,
  settings_key         TEXT    NOT NULL,
  last_processed_index INTEGER NOT NULL,
  is_complete          INTEGER NOT NULL DEFAULT 0,
  total_pages          INTEGER,
  view_width           REAL,
  view_height          REAL,
  last_updated         REAL    NOT NULL,
  PRIMARY KEY (book_hash, settings_key)
);

CREATE INDEX IF NOT EXISTS page_cache_order
  ON page_cache (book_hash, settings_key, page_number);
";

/// Durable cache for computed page ranges and pagination progress.
pub struct CacheStore {
    conn: Mutex<Connection>,
    busy_timeout: Duration,
}

impl CacheStore {
    /// Open (creating if needed) the cache database described by `config`,
    /// enable WAL mode, and run idempotent schema migrations.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let dir = config.resolve_cache_dir()?;
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::CacheDirUnavailable {
            message: e.to_string(),
        })?;
        Self::open_at(&dir.join("cache.sqlite3"), config.busy_timeout)
    }

    /// Open the cache database at an exact path, bypassing directory
    /// resolution. Used directly by tests that want a known file location.
    pub fn open_at(path: &PathBuf, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        Ok(CacheStore {
            conn: Mutex::new(conn),
            busy_timeout,
        })
    }

    /// Open an in-memory store; only ever useful in tests, since the cache
    /// is meant to outlive the process.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(CacheStore {
            conn: Mutex::new(conn),
            busy_timeout: Duration::from_secs(3),
        })
    }

    /// Persist a contiguous batch of pages together with the pagination
    /// progress metadata for `(book_hash, settings_key)`, all within a
    /// single transaction: either every page and the meta row become
    /// visible, or none of them do (§4.5). Idempotent: re-upserting the same
    /// page number, or the same `(book_hash, settings_key)` meta row,
    /// overwrites it.
    pub fn upsert_batch(
        &self,
        book_hash: &str,
        settings_key: &str,
        pages: &[PageRange],
        last_processed_index: usize,
        is_complete: bool,
        total_pages: Option<u64>,
        viewport: ViewportSize,
        now: f64,
    ) -> Result<(), StoreError> {
        self.with_retry(|| {
            let mut conn = self.conn.lock().expect("cache store mutex poisoned");
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO page_cache
                        (book_hash, settings_key, page_number, start_index, end_index, content, last_updated)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT (book_hash, settings_key, page_number) DO UPDATE SET
                        start_index = excluded.start_index,
                        end_index = excluded.end_index,
                        content = excluded.content,
                        last_updated = excluded.last_updated",
                )?;
                for page in pages {
                    stmt.execute(params![
                        book_hash,
                        settings_key,
                        page.page_number as i64,
                        page.start_index as i64,
                        page.end_index as i64,
                        page.content,
                        now,
                    ])?;
                }
            }
            tx.execute(
                "INSERT INTO page_meta
                    (book_hash, settings_key, last_processed_index, is_complete, total_pages, view_width, view_height, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (book_hash, settings_key) DO UPDATE SET
                    last_processed_index = excluded.last_processed_index,
                    is_complete = excluded.is_complete,
                    total_pages = excluded.total_pages,
                    view_width = excluded.view_width,
                    view_height = excluded.view_height,
                    last_updated = excluded.last_updated",
                params![
                    book_hash,
                    settings_key,
                    last_processed_index as i64,
                    is_complete as i64,
                    total_pages.map(|n| n as i64),
                    viewport.width,
                    viewport.height,
                    now,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    /// Fetch one page, if cached. `content` is `None` when the row stored
    /// `NULL`; callers re-slice from the source text in that case.
    pub fn fetch_page(
        &self,
        book_hash: &str,
        settings_key: &str,
        page_number: u64,
    ) -> Result<Option<PageRange>, StoreError> {
        self.with_retry(|| {
            let conn = self.conn.lock().expect("cache store mutex poisoned");
            conn.query_row(
                "SELECT page_number, start_index, end_index, content
                 FROM page_cache
                 WHERE book_hash = ?1 AND settings_key = ?2 AND page_number = ?3",
                params![book_hash, settings_key, page_number as i64],
                |row| {
                    Ok(PageRange {
                        page_number: row.get::<_, i64>(0)? as u64,
                        start_index: row.get::<_, i64>(1)? as usize,
                        end_index: row.get::<_, i64>(2)? as usize,
                        content: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Number of pages cached so far for `(book_hash, settings_key)`. Not
    /// the same as `Meta::total_pages`, which is only `Some` once complete.
    pub fn fetch_page_count(
        &self,
        book_hash: &str,
        settings_key: &str,
    ) -> Result<u64, StoreError> {
        self.with_retry(|| {
            let conn = self.conn.lock().expect("cache store mutex poisoned");
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM page_cache WHERE book_hash = ?1 AND settings_key = ?2",
                params![book_hash, settings_key],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Fetch pagination progress metadata, if a job has ever committed for
    /// `(book_hash, settings_key)`.
    pub fn fetch_meta(
        &self,
        book_hash: &str,
        settings_key: &str,
    ) -> Result<Option<Meta>, StoreError> {
        self.with_retry(|| {
            let conn = self.conn.lock().expect("cache store mutex poisoned");
            conn.query_row(
                "SELECT last_processed_index, is_complete, total_pages, view_width, view_height, last_updated
                 FROM page_meta
                 WHERE book_hash = ?1 AND settings_key = ?2",
                params![book_hash, settings_key],
                |row| {
                    Ok(Meta {
                        settings_key: settings_key.to_string(),
                        last_processed_index: row.get::<_, i64>(0)? as usize,
                        is_complete: row.get::<_, i64>(1)? != 0,
                        total_pages: row.get::<_, Option<i64>>(2)?.map(|n| n as u64),
                        viewport: ViewportSize::new(row.get(3)?, row.get(4)?),
                        last_updated: row.get(5)?,
                    })
                },
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Upsert pagination progress metadata for `(book_hash, settings_key)`.
    pub fn upsert_meta(&self, book_hash: &str, meta: &Meta) -> Result<(), StoreError> {
        self.with_retry(|| {
            let conn = self.conn.lock().expect("cache store mutex poisoned");
            conn.execute(
                "INSERT INTO page_meta
                    (book_hash, settings_key, last_processed_index, is_complete, total_pages, view_width, view_height, last_updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (book_hash, settings_key) DO UPDATE SET
                    last_processed_index = excluded.last_processed_index,
                    is_complete = excluded.is_complete,
                    total_pages = excluded.total_pages,
                    view_width = excluded.view_width,
                    view_height = excluded.view_height,
                    last_updated = excluded.last_updated",
                params![
                    book_hash,
                    meta.settings_key,
                    meta.last_processed_index as i64,
                    meta.is_complete as i64,
                    meta.total_pages.map(|n| n as i64),
                    meta.viewport.width,
                    meta.viewport.height,
                    meta.last_updated,
                ],
            )?;
            Ok(())
        })
    }

    /// Delete every cached page and meta row for a book, across all
    /// settings keys. Used when a book is removed from the library.
    pub fn delete_all_for_book(&self, book_hash: &str) -> Result<(), StoreError> {
        self.with_retry(|| {
            let conn = self.conn.lock().expect("cache store mutex poisoned");
            conn.execute("DELETE FROM page_cache WHERE book_hash = ?1", params![book_hash])?;
            conn.execute("DELETE FROM page_meta WHERE book_hash = ?1", params![book_hash])?;
            Ok(())
        })
    }

    /// Delete every cached settings key for a book except `keep_settings_key`.
    /// Used to evict stale layouts once a new one becomes authoritative.
    pub fn delete_all_except(
        &self,
        book_hash: &str,
        keep_settings_key: &str,
    ) -> Result<(), StoreError> {
        self.with_retry(|| {
            let conn = self.conn.lock().expect("cache store mutex poisoned");
            conn.execute(
                "DELETE FROM page_cache WHERE book_hash = ?1 AND settings_key != ?2",
                params![book_hash, keep_settings_key],
            )?;
            conn.execute(
                "DELETE FROM page_meta WHERE book_hash = ?1 AND settings_key != ?2",
                params![book_hash, keep_settings_key],
            )?;
            Ok(())
        })
    }

    /// Run `op`; on `StoreBusy`, sleep briefly and retry exactly once,
    /// bounding total wait at roughly `2 * busy_timeout`.
    fn with_retry<T>(&self, op: impl Fn() -> Result<T, StoreError>) -> Result<T, StoreError> {
        let started = Instant::now();
        match op() {
            Err(StoreError::StoreBusy { .. }) => {
                thread::sleep(Duration::from_millis(50));
                op().map_err(|err| match err {
                    StoreError::StoreBusy { .. } => StoreError::StoreBusy {
                        waited_millis: started.elapsed().as_millis() as u64,
                    },
                    other => other,
                })
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pages() -> Vec<PageRange> {
        vec![
            PageRange {
                page_number: 1,
                start_index: 0,
                end_index: 3,
                content: Some("abc".into()),
            },
            PageRange {
                page_number: 2,
                start_index: 3,
                end_index: 6,
                content: Some("def".into()),
            },
        ]
    }

    fn no_viewport() -> ViewportSize {
        ViewportSize::new(0.0, 0.0)
    }

    #[test]
    fn upsert_then_fetch_round_trips() {
        let store = CacheStore::open_in_memory().unwrap();
        store
            .upsert_batch("hash1", "key1", &sample_pages(), 6, false, None, no_viewport(), 100.0)
            .unwrap();
        let page = store.fetch_page("hash1", "key1", 2).unwrap().unwrap();
        assert_eq!(page.start_index, 3);
        assert_eq!(page.end_index, 6);
        assert_eq!(page.content.as_deref(), Some("def"));
        assert_eq!(store.fetch_page_count("hash1", "key1").unwrap(), 2);
    }

    #[test]
    fn fetch_missing_page_is_none() {
        let store = CacheStore::open_in_memory().unwrap();
        assert!(store.fetch_page("nope", "nope", 1).unwrap().is_none());
    }

    #[test]
    fn upsert_is_idempotent_on_page_number() {
        let store = CacheStore::open_in_memory().unwrap();
        store
            .upsert_batch("hash1", "key1", &sample_pages(), 6, false, None, no_viewport(), 100.0)
            .unwrap();
        let mut updated = sample_pages();
        updated[0].content = Some("ABC".into());
        store
            .upsert_batch("hash1", "key1", &updated, 6, false, None, no_viewport(), 200.0)
            .unwrap();
        assert_eq!(store.fetch_page_count("hash1", "key1").unwrap(), 2);
        let page = store.fetch_page("hash1", "key1", 1).unwrap().unwrap();
        assert_eq!(page.content.as_deref(), Some("ABC"));
    }

    #[test]
    fn upsert_batch_commits_pages_and_meta_atomically() {
        let store = CacheStore::open_in_memory().unwrap();
        store
            .upsert_batch("hash1", "key1", &sample_pages(), 6, true, Some(2), no_viewport(), 100.0)
            .unwrap();
        let meta = store.fetch_meta("hash1", "key1").unwrap().unwrap();
        assert_eq!(meta.last_processed_index, 6);
        assert!(meta.is_complete);
        assert_eq!(meta.total_pages, Some(2));
    }

    #[test]
    fn meta_round_trips() {
        let store = CacheStore::open_in_memory().unwrap();
        let meta = Meta {
            settings_key: "key1".into(),
            last_processed_index: 6,
            is_complete: false,
            total_pages: None,
            viewport: ViewportSize::new(390.0, 844.0),
            last_updated: 123.0,
        };
        store.upsert_meta("hash1", &meta).unwrap();
        let fetched = store.fetch_meta("hash1", "key1").unwrap().unwrap();
        assert_eq!(fetched, meta);
    }

    #[test]
    fn delete_all_for_book_clears_every_settings_key() {
        let store = CacheStore::open_in_memory().unwrap();
        store
            .upsert_batch("hash1", "key1", &sample_pages(), 6, false, None, no_viewport(), 1.0)
            .unwrap();
        store
            .upsert_batch("hash1", "key2", &sample_pages(), 6, false, None, no_viewport(), 1.0)
            .unwrap();
        store.delete_all_for_book("hash1").unwrap();
        assert_eq!(store.fetch_page_count("hash1", "key1").unwrap(), 0);
        assert_eq!(store.fetch_page_count("hash1", "key2").unwrap(), 0);
    }

    #[test]
    fn delete_all_except_keeps_only_the_named_key() {
        let store = CacheStore::open_in_memory().unwrap();
        store
            .upsert_batch("hash1", "key1", &sample_pages(), 6, false, None, no_viewport(), 1.0)
            .unwrap();
        store
            .upsert_batch("hash1", "key2", &sample_pages(), 6, false, None, no_viewport(), 1.0)
            .unwrap();
        store.delete_all_except("hash1", "key2").unwrap();
        assert_eq!(store.fetch_page_count("hash1", "key1").unwrap(), 0);
        assert_eq!(store.fetch_page_count("hash1", "key2").unwrap(), 2);
    }
}
