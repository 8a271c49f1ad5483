//! Background pagination worker (C6) and reader-session facade (C7).
//!
//! Sits above `page_engine` (the pure pagination core) and
//! `page-engine-store` (the durable cache), tying them into the stateful,
//! long-lived object UI code actually holds onto.

#![warn(missing_docs)]

pub mod error;
pub mod session;
pub mod worker;

pub use error::SessionError;
pub use session::{Page, ReaderSession, SessionState};
pub use worker::{BackgroundWorker, BatchCommitted, Job, WorkerEvent};
