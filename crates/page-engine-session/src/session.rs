//! Reader-facing facade (C7) over the [`BackgroundWorker`] and
//! [`CacheStore`], the only surface UI code should depend on (§6.3).

use std::num::NonZeroUsize;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;

use page_engine::{
    open_book, Book, DrawableSize, LayoutAttributes, LayoutEngine, Metrics, SettingsKey,
    UserSettings, ViewportSize,
};
use page_engine_store::CacheStore;

use crate::error::SessionError;
use crate::worker::{BackgroundWorker, Job, WorkerEvent};

const LRU_CAPACITY: usize = 20;

/// One page as served to the UI: its text, whether that text came from a
/// committed, exactly-measured page or an estimated window, and the
/// boundaries behind it. `end_index` is `None` for an estimated page —
/// its window is a guess, not a measured layout boundary (§4.7).
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    /// The page's text.
    pub text: String,
    /// `true` once this page came from a committed batch or the LRU cache
    /// of one; `false` for an estimated window.
    pub is_authoritative: bool,
    /// UTF-16 offset the page begins at.
    pub start_index: usize,
    /// UTF-16 offset the page ends at; `None` when estimated.
    pub end_index: Option<usize>,
}

/// Pagination readiness, tracked per current settings key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No page has been committed yet for the current settings key.
    Loading,
    /// A priority-hint preview page is available, but the authoritative
    /// linear pass has not started committing batches yet.
    EstimatedReady,
    /// Batches covering `[from_page, to_page]` have committed so far.
    Authoritative {
        /// First committed page number.
        from_page: u64,
        /// Last committed page number (inclusive).
        to_page: u64,
    },
    /// The background worker has finished paginating the whole book.
    Complete,
}

/// Stateful reader session: owns the book's decoded text, drives the
/// background pagination worker, and serves page content from an LRU plus
/// the durable cache, falling back to an estimated window when a page
/// hasn't been committed yet.
pub struct ReaderSession {
    book: Book,
    metrics: Metrics,
    settings: UserSettings,
    viewport: ViewportSize,
    settings_key: SettingsKey,
    store: Arc<CacheStore>,
    worker: BackgroundWorker,
    events: Receiver<WorkerEvent>,
    text: page_engine::CanonicalText,
    lru: LruCache<(String, u64), page_engine::PageRange>,
    state: SessionState,
}

impl ReaderSession {
    /// Open `path`, compute the initial settings key, and kick off
    /// background pagination (resuming from the durable cache if a prior
    /// run already made progress under the same key).
    pub fn open(
        path: &std::path::Path,
        metrics: Metrics,
        settings: UserSettings,
        viewport: ViewportSize,
        store: Arc<CacheStore>,
    ) -> Result<Self, SessionError> {
        let opened = open_book(path, &metrics, None)?;
        let settings_key = SettingsKey::compute(&opened.book, &settings, viewport, &metrics);

        let (worker, events) = BackgroundWorker::spawn(Arc::clone(&store), metrics);

        let mut session = ReaderSession {
            book: opened.book,
            metrics,
            settings,
            viewport,
            settings_key,
            store,
            worker,
            events,
            text: opened.text,
            lru: LruCache::new(NonZeroUsize::new(LRU_CAPACITY).unwrap()),
            state: SessionState::Loading,
        };
        session.start_job(None);
        Ok(session)
    }

    fn layout_engine(&self) -> LayoutEngine {
        LayoutEngine::new(self.metrics)
    }

    fn layout_attrs(&self) -> LayoutAttributes {
        LayoutAttributes::from_settings(&self.settings)
    }

    fn drawable(&self) -> DrawableSize {
        self.viewport.drawable_size(&self.metrics)
    }

    fn start_job(&mut self, priority_hint: Option<usize>) {
        let (start_index, start_page_number) = self
            .store
            .fetch_meta(&self.book.content_hash, self.settings_key.as_str())
            .ok()
            .flatten()
            .filter(|meta| !meta.is_complete)
            .map(|meta| {
                let resumed_page = self
                    .store
                    .fetch_page_count(&self.book.content_hash, self.settings_key.as_str())
                    .unwrap_or(0)
                    + 1;
                (meta.last_processed_index, resumed_page)
            })
            .unwrap_or((0, 1));

        if start_index >= self.text.len() {
            self.state = SessionState::Complete;
            return;
        }

        self.state = SessionState::Loading;
        let job = Job {
            book_hash: self.book.content_hash.clone(),
            settings_key: self.settings_key.as_str().to_string(),
            start_index,
            start_page_number,
            priority_hint,
        };
        self.worker.start_or_resume(
            job,
            self.text.clone(),
            self.layout_engine(),
            self.layout_attrs(),
            self.drawable(),
        );
    }

    /// Drain any pending worker notifications and update session state.
    /// Call before reading `state()`/`page_count()` for a fresh view; also
    /// called internally by every read operation.
    pub fn poll_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Preview { book_hash, page } => {
                if book_hash == self.book.content_hash && self.state == SessionState::Loading {
                    self.state = SessionState::EstimatedReady;
                    self.lru.put((self.settings_key.as_str().to_string(), page.page_number), page);
                }
            }
            WorkerEvent::Committed(batch) => {
                if batch.settings_key != self.settings_key.as_str() {
                    return;
                }
                self.lru_invalidate_range(batch.first_page, batch.last_page);
                self.state = if batch.is_complete {
                    SessionState::Complete
                } else {
                    SessionState::Authoritative {
                        from_page: batch.first_page,
                        to_page: batch.last_page,
                    }
                };
            }
            WorkerEvent::Failed { error, .. } => {
                tracing::warn!(%error, "background pagination job failed");
            }
        }
    }

    fn lru_invalidate_range(&mut self, from_page: u64, to_page: u64) {
        for page_number in from_page..=to_page {
            self.lru.pop(&(self.settings_key.as_str().to_string(), page_number));
        }
    }

    /// Current readiness state, after draining pending worker events.
    pub fn state(&mut self) -> SessionState {
        self.poll_events();
        self.state
    }

    /// Best current estimate of total page count: exact once `Complete`,
    /// otherwise the number of pages committed so far (a lower bound).
    pub fn page_count(&mut self) -> u64 {
        self.poll_events();
        self.store
            .fetch_page_count(&self.book.content_hash, self.settings_key.as_str())
            .unwrap_or(0)
    }

    /// Fetch page `n`: LRU, then the durable cache (both authoritative),
    /// then an estimated `text.len() / estimatedPageCount` window (§4.7) for
    /// a page the background worker hasn't reached yet. The estimated path
    /// never re-paginates the book — it only ever takes, at most, one cheap
    /// single-page measurement to seed its average, never a full linear
    /// pass — and nothing it produces is written to the durable cache,
    /// since only the background worker owns that ascending-order write
    /// path.
    pub fn page_content(&mut self, page_number: u64) -> Result<Page, SessionError> {
        self.poll_events();
        let key = (self.settings_key.as_str().to_string(), page_number);
        if let Some(page) = self.lru.get(&key) {
            let text = page
                .content
                .clone()
                .unwrap_or_else(|| self.text.slice(page.start_index, page.end_index));
            return Ok(Page {
                text,
                is_authoritative: true,
                start_index: page.start_index,
                end_index: Some(page.end_index),
            });
        }
        if let Some(page) = self
            .store
            .fetch_page(&self.book.content_hash, self.settings_key.as_str(), page_number)?
        {
            let text = page
                .content
                .clone()
                .unwrap_or_else(|| self.text.slice(page.start_index, page.end_index));
            let start_index = page.start_index;
            let end_index = page.end_index;
            self.lru.put(key, page);
            return Ok(Page {
                text,
                is_authoritative: true,
                start_index,
                end_index: Some(end_index),
            });
        }
        let (start, end) = self.estimated_window(page_number);
        Ok(Page {
            text: self.text.slice(start, end),
            is_authoritative: false,
            start_index: start,
            end_index: None,
        })
    }

    /// Average UTF-16 code units per committed page, used to size the
    /// estimated window for pages the background worker hasn't reached yet.
    /// Derived from the authoritative prefix's progress once any batch has
    /// committed; before that, seeded with a single cheap `measure_page`
    /// call at index 0 (never a full pagination pass).
    fn estimated_chars_per_page(&mut self) -> f64 {
        if self.text.is_empty() {
            return 0.0;
        }
        if let Ok(Some(meta)) = self
            .store
            .fetch_meta(&self.book.content_hash, self.settings_key.as_str())
        {
            let committed = self
                .store
                .fetch_page_count(&self.book.content_hash, self.settings_key.as_str())
                .unwrap_or(0);
            if committed > 0 {
                return meta.last_processed_index as f64 / committed as f64;
            }
        }
        let engine = self.layout_engine();
        let attrs = self.layout_attrs();
        let drawable = self.drawable();
        let result = engine.measure_page(&self.text, 0, attrs, drawable);
        result.length.max(1) as f64
    }

    /// Estimated `[start, end)` UTF-16 window for `page_number`, rounded to
    /// surrogate-pair-safe boundaries and clamped to the text's length.
    fn estimated_window(&mut self, page_number: u64) -> (usize, usize) {
        let avg = self.estimated_chars_per_page();
        if avg <= 0.0 {
            return (0, 0);
        }
        let raw_start = (page_number.saturating_sub(1) as f64 * avg).round() as usize;
        let start = self.text.round_down_to_boundary(raw_start.min(self.text.len()));
        let raw_end = (start as f64 + avg).round() as usize;
        let end = self.text.round_down_to_boundary(raw_end.min(self.text.len()));
        (start, end.max(start))
    }

    /// UTF-16 offset `current_page` begins at: the cached `startIndex` when
    /// authoritative, otherwise the start of the estimated window. Floors to
    /// `0` for an empty book (no page, authoritative or estimated, can begin
    /// anywhere else).
    pub fn current_character_index(&mut self, current_page: u64) -> u64 {
        self.poll_events();
        if let Some(page) = self
            .lru
            .get(&(self.settings_key.as_str().to_string(), current_page))
        {
            return page.start_index as u64;
        }
        if let Ok(Some(page)) = self
            .store
            .fetch_page(&self.book.content_hash, self.settings_key.as_str(), current_page)
        {
            return page.start_index as u64;
        }
        self.estimated_window(current_page).0 as u64
    }

    /// Apply new layout settings. Recomputes `settings_key`; if it changed,
    /// evicts the LRU, cancels the in-flight job, and starts a new one
    /// (resuming from the cache if this exact key was paginated before).
    pub fn update_settings(&mut self, settings: UserSettings) {
        let new_key = SettingsKey::compute(&self.book, &settings, self.viewport, &self.metrics);
        self.settings = settings;
        self.rekey(new_key, None);
    }

    /// Apply a new viewport size. Same re-keying behavior as
    /// [`Self::update_settings`].
    pub fn update_viewport(&mut self, viewport: ViewportSize) {
        self.viewport = viewport;
        let new_key = SettingsKey::compute(&self.book, &self.settings, viewport, &self.metrics);
        self.rekey(new_key, None);
    }

    /// Re-decode the book under a forced encoding. Produces new canonical
    /// text and therefore a new `settings_key` even though `content_hash`
    /// (a digest of the raw bytes) is unchanged, per §9.
    pub fn override_encoding(&mut self, encoding_name: &str) -> Result<(), SessionError> {
        let opened = open_book(&self.book.file_path, &self.metrics, Some(encoding_name))?;
        self.book = opened.book;
        self.text = opened.text;
        let new_key = SettingsKey::compute(&self.book, &self.settings, self.viewport, &self.metrics);
        self.rekey(new_key, None);
        Ok(())
    }

    fn rekey(&mut self, new_key: SettingsKey, priority_hint: Option<usize>) {
        if new_key == self.settings_key {
            return;
        }
        self.worker.cancel(&self.book.content_hash);
        self.lru.clear();
        self.settings_key = new_key;
        self.start_job(priority_hint);
    }

    /// Re-key pagination to prioritize a window near `character_index`
    /// before the rest of the book, e.g. right after the user jumps to a
    /// bookmark. Absence of this call is always conformant: linear
    /// pagination from the start is the default (§9).
    pub fn prioritize_around(&mut self, character_index: usize) {
        let key = self.settings_key.clone();
        self.worker.cancel(&self.book.content_hash);
        self.lru.clear();
        self.settings_key = key;
        self.start_job(Some(character_index));
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.worker.cancel(&self.book.content_hash);
    }
}
