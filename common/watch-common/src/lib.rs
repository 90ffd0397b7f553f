//! Watch Common - Shared plumbing for trend-pager
//!
//! This crate provides the pieces that sit underneath the scheduled handler:
//!
//! - **Initialization**: [`init_tracing`] for standardized logging setup
//! - **Cache**: the [`KeyValueStore`] trait the handler persists state through,
//!   with an in-memory and a SQLite-backed implementation
//!
//! # Example
//!
//! ```rust,ignore
//! use watch_common::{init_tracing, KeyValueStore, SqliteStore};
//!
//! init_tracing("trend_pager")?;
//!
//! let store = SqliteStore::open(SqliteStore::default_path()?)?;
//! store.set("pagerduty_active_incident", Some("dedup-123")).await?;
//! ```

pub mod cache;
pub mod init;

// Re-export commonly used items at crate root
pub use cache::{CacheError, CacheResult, KeyValueStore, MemoryStore, SqliteStore};
pub use init::init_tracing;
