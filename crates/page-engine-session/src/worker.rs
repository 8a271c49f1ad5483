//! Single-queue background pagination worker (C6).
//!
//! Unlike the teacher's one-shot `prepare_chapter_iter_streaming` call (which
//! runs its chunked loop to completion synchronously on the caller's
//! thread), the worker here is long-lived: it spawns once per
//! [`crate::ReaderSession`] and receives jobs over an `mpsc` command channel,
//! committing batches to the [`CacheStore`] and announcing them over a
//! second channel so the session thread never polls or blocks.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use page_engine::{CanonicalText, LayoutAttributes, LayoutEngine, Metrics, Paginator};
use page_engine_store::CacheStore;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SessionError;

/// A unit of pagination work: resume (or start) a job for one book under
/// one settings key.
pub struct Job {
    /// Content hash identifying the book.
    pub book_hash: String,
    /// Fingerprint of the layout configuration this job paginates against.
    pub settings_key: String,
    /// UTF-16 offset to resume from; `0` for a fresh job.
    pub start_index: usize,
    /// Page number the resumed job's next page should carry.
    pub start_page_number: u64,
    /// Optional window, in UTF-16 units, to prioritize before falling back
    /// to strict linear order from `start_index`. Per §9: absence is
    /// conformant, linear-only pagination.
    pub priority_hint: Option<usize>,
}

/// Commands accepted by the worker's command channel.
enum Command {
    StartOrResume(Job, CanonicalText, LayoutEngine, LayoutAttributes, page_engine::DrawableSize),
    Cancel { book_hash: String },
    Shutdown,
}

/// Announcement that a batch of pages has been durably committed.
#[derive(Clone, Debug)]
pub struct BatchCommitted {
    /// Content hash of the book the batch belongs to.
    pub book_hash: String,
    /// Settings key the batch was paginated under.
    pub settings_key: String,
    /// First page number in the batch.
    pub first_page: u64,
    /// Last page number in the batch.
    pub last_page: u64,
    /// True once this batch finished the book.
    pub is_complete: bool,
}

/// Notifications the worker emits: batch commits, a job-ending error, or an
/// uncommitted priority-hint preview.
pub enum WorkerEvent {
    /// A batch of pages committed successfully.
    Committed(BatchCommitted),
    /// An uncommitted single-page preview computed near a job's
    /// `priority_hint`, emitted once before the authoritative linear pass
    /// begins. Never written to the cache store; `ReaderSession` serves it
    /// as `EstimatedReady` content until the authoritative pass catches up.
    Preview {
        /// Book the preview belongs to.
        book_hash: String,
        /// The uncommitted page.
        page: page_engine::PageRange,
    },
    /// The job for `book_hash` ended with a fatal error (not a diagnostic,
    /// not a cancellation).
    Failed {
        /// Book whose job failed.
        book_hash: String,
        /// What went wrong.
        error: SessionError,
    },
}

/// A dedicated background thread that runs pagination jobs to completion,
/// one at a time, committing batches of [`Metrics::batch_page_size`] pages.
pub struct BackgroundWorker {
    commands: Sender<Command>,
    handle: Option<JoinHandle<()>>,
    cancel_flag: Arc<AtomicBool>,
}

impl BackgroundWorker {
    /// Spawn the worker thread. `events` is the receiving end the caller
    /// should poll (or bridge to a subscription fan-out) for
    /// [`WorkerEvent`]s.
    pub fn spawn(store: Arc<CacheStore>, metrics: Metrics) -> (Self, Receiver<WorkerEvent>) {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let worker_cancel_flag = Arc::clone(&cancel_flag);

        let handle = thread::spawn(move || {
            run_loop(command_rx, event_tx, store, metrics, worker_cancel_flag);
        });

        (
            BackgroundWorker {
                commands: command_tx,
                handle: Some(handle),
                cancel_flag,
            },
            event_rx,
        )
    }

    /// Enqueue a job. Resumes from `job.start_index`/`job.start_page_number`
    /// if non-zero, otherwise starts a fresh pagination run at the
    /// beginning of the text.
    ///
    /// Does not touch `cancel_flag`: a prior in-flight job's cancellation
    /// must survive until `run_loop` picks up this command and clears the
    /// flag itself (`run_loop`, just before calling `run_job`). Clearing it
    /// here instead would race a `cancel()` immediately followed by
    /// `start_or_resume()` (exactly what `ReaderSession::rekey` does),
    /// letting the old job's between-batch check read `false` and run to
    /// completion instead of stopping.
    pub fn start_or_resume(
        &self,
        job: Job,
        text: CanonicalText,
        engine: LayoutEngine,
        attrs: LayoutAttributes,
        drawable: page_engine::DrawableSize,
    ) {
        let _ = self
            .commands
            .send(Command::StartOrResume(job, text, engine, attrs, drawable));
    }

    /// Cooperatively cancel the in-flight job for `book_hash`, if any. Takes
    /// effect between batches; an in-flight batch finishes committing first.
    pub fn cancel(&self, book_hash: &str) {
        self.cancel_flag.store(true, Ordering::SeqCst);
        let _ = self.commands.send(Command::Cancel {
            book_hash: book_hash.to_string(),
        });
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    commands: Receiver<Command>,
    events: Sender<WorkerEvent>,
    store: Arc<CacheStore>,
    metrics: Metrics,
    cancel_flag: Arc<AtomicBool>,
) {
    while let Ok(command) = commands.recv() {
        match command {
            Command::Shutdown => break,
            Command::Cancel { .. } => {
                // Already reflected in `cancel_flag`; nothing else to do
                // until the in-flight job notices it between batches.
            }
            Command::StartOrResume(job, text, engine, attrs, drawable) => {
                cancel_flag.store(false, Ordering::SeqCst);
                run_job(&store, &metrics, &cancel_flag, job, &text, &engine, attrs, drawable, &events);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_job(
    store: &CacheStore,
    metrics: &Metrics,
    cancel_flag: &AtomicBool,
    job: Job,
    text: &CanonicalText,
    engine: &LayoutEngine,
    attrs: LayoutAttributes,
    drawable: page_engine::DrawableSize,
    events: &Sender<WorkerEvent>,
) {
    let span = tracing::info_span!("pagination_job", book_hash = %job.book_hash, settings_key = %job.settings_key);
    let _enter = span.enter();

    if let Some(hint_index) = job.priority_hint {
        if hint_index < text.len() {
            let result = engine.measure_page(text, hint_index, attrs, drawable);
            let end_index = hint_index + result.length;
            let _ = events.send(WorkerEvent::Preview {
                book_hash: job.book_hash.clone(),
                page: page_engine::PageRange {
                    page_number: 0,
                    start_index: hint_index,
                    end_index,
                    content: Some(text.slice(hint_index, end_index)),
                },
            });
        }
    }

    let paginator = Paginator::new(
        text,
        engine,
        attrs,
        drawable,
        job.start_index,
        job.start_page_number,
        true,
    );

    let mut batch = Vec::with_capacity(metrics.batch_page_size);
    let mut last_index = job.start_index;
    let mut pages_committed: u64 = 0;

    for step in paginator {
        if let Some(diagnostic) = &step.diagnostic {
            tracing::warn!(%diagnostic, page = step.page.page_number, "layout diagnostic");
        }
        last_index = step.page.end_index;
        batch.push(step.page);

        if batch.len() >= metrics.batch_page_size {
            pages_committed += batch.len() as u64;
            if !commit_batch(store, &job, &batch, last_index, false, pages_committed, events) {
                return;
            }
            batch.clear();

            if cancel_flag.load(Ordering::SeqCst) {
                tracing::debug!("job cancelled between batches");
                return;
            }
            thread::sleep(Duration::from_millis(metrics.batch_yield_millis));
        }
    }

    let is_complete = last_index >= text.len();
    if !batch.is_empty() || is_complete {
        pages_committed += batch.len() as u64;
        commit_batch(store, &job, &batch, last_index, is_complete, pages_committed, events);
    }
}

/// Commit one batch of pages (possibly empty, for a completion-only commit)
/// together with the pagination progress metadata, in a single
/// `CacheStore::upsert_batch` transaction. `last_index` and
/// `pages_committed` are threaded in from `run_job`'s running totals rather
/// than derived from `batch`, which is empty exactly on the completion
/// commit that follows an exact-multiple-of-`batch_page_size` final batch.
#[allow(clippy::too_many_arguments)]
fn commit_batch(
    store: &CacheStore,
    job: &Job,
    batch: &[page_engine::PageRange],
    last_index: usize,
    is_complete: bool,
    pages_committed: u64,
    events: &Sender<WorkerEvent>,
) -> bool {
    let now = unix_timestamp();

    if let Err(err) = store.upsert_batch(
        &job.book_hash,
        &job.settings_key,
        batch,
        last_index,
        is_complete,
        is_complete.then_some(pages_committed),
        page_engine::ViewportSize::new(0.0, 0.0),
        now,
    ) {
        tracing::error!(%err, "failed to commit pagination batch");
        let _ = events.send(WorkerEvent::Failed {
            book_hash: job.book_hash.clone(),
            error: SessionError::from(err),
        });
        return false;
    }

    if let (Some(first), Some(last)) = (batch.first(), batch.last()) {
        tracing::debug!(first = first.page_number, last = last.page_number, is_complete, "batch committed");
        let _ = events.send(WorkerEvent::Committed(BatchCommitted {
            book_hash: job.book_hash.clone(),
            settings_key: job.settings_key.clone(),
            first_page: first.page_number,
            last_page: last.page_number,
            is_complete,
        }));
    } else if is_complete {
        let _ = events.send(WorkerEvent::Committed(BatchCommitted {
            book_hash: job.book_hash.clone(),
            settings_key: job.settings_key.clone(),
            first_page: 0,
            last_page: 0,
            is_complete: true,
        }));
    }

    true
}

fn unix_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
