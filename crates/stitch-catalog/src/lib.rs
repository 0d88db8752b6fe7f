//! Read-only clip catalog backed by SQLite.
//!
//! The catalog answers three questions for the planner:
//! - where is this word spoken (`lookup_word`)
//! - where is this phrase spoken (`lookup_phrase`, via the n-gram index
//!   with a transcript-scan fallback)
//! - what is the full transcript of a video (`transcript`, LRU-cached)
//!
//! Rows are written by a separate ingestion tool; this crate never
//! mutates the catalog tables.

mod cache;
mod catalog;
mod error;
pub mod schema;

pub use cache::TranscriptCache;
pub use catalog::{CatalogStats, ClipCatalog, LookupOptions};
pub use error::{CatalogError, CatalogResult};
