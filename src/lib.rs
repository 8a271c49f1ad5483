//! page_engine -- deterministic pagination engine for long-form plain-text
//! readers.
//!
//! Turns a plain-text book plus a user layout configuration into a
//! deterministic, stable sequence of fixed-size pages. This crate owns the
//! pure, stateless core — source loading, encoding resolution, layout
//! measurement, and pagination (C1-C4, C8-C9). Durable storage and the
//! stateful worker/session facade live in the sibling `page-engine-store`
//! and `page-engine-session` crates so this crate stays free of a SQLite
//! dependency.
//!
//! # Features
//!
//! - `cli` -- builds the `page-engine-cli` demo binary

#![warn(missing_docs)]

pub mod encoding;
pub mod error;
pub mod layout;
pub mod metrics;
pub mod model;
pub mod open;
pub mod paginator;
pub mod source;
pub mod text;

pub use encoding::{DecodeOutcome, EncodingResolver};
pub use error::EngineError;
pub use layout::{LayoutAttributes, LayoutEngine, LayoutResult};
pub use metrics::Metrics;
pub use model::{Book, DrawableSize, Meta, PageRange, SettingsKey, Theme, UserSettings, ViewportSize};
pub use open::{open_book, OpenedBook};
pub use paginator::{Paginator, PaginatorStep};
pub use source::TextSource;
pub use text::CanonicalText;
