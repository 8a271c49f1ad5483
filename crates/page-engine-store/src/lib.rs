//! Durable, embedded cache store (C5) for computed page ranges and
//! pagination progress, backed by `rusqlite`.
//!
//! Kept as a sibling crate to `page_engine` so the pure pagination core
//! never needs a SQLite dependency; this crate depends back on it for the
//! [`page_engine::PageRange`]/[`page_engine::Meta`] value types it persists.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod store;

pub use config::StoreConfig;
pub use error::StoreError;
pub use store::CacheStore;
