//! Feed subscription and ingestion engine.
//!
//! Discovers RSS/Atom feeds from user-entered URLs, refreshes them with
//! bounded concurrency, deduplicates articles into SQLite, and keeps a
//! periodic background refresh running under connectivity constraints.

pub mod background;
pub mod config;
pub mod context;
pub mod feed;
pub mod http;
pub mod storage;
pub mod util;

pub use context::{AppContext, ContextError};
