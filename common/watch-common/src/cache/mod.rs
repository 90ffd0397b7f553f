//! Key-value cache stores
//!
//! The scheduled handler keeps exactly one piece of state between ticks. It
//! reaches that state through [`KeyValueStore`], so the store is injected
//! rather than being a process-wide singleton.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by a cache store
#[derive(Error, Debug)]
pub enum CacheError {
    /// The SQLite backend failed
    #[error("sqlite cache error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The cache file or its directory could not be prepared
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// A string-keyed store that outlives a single invocation
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key was never set or has been cleared
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write a value; `None` clears the key
    async fn set(&self, key: &str, value: Option<&str>) -> CacheResult<()>;
}
