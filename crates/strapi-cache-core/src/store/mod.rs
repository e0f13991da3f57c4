//! Cache store abstraction and bundled implementations.
//!
//! The client only ever talks to a store through [`CacheStore`]: four keyed
//! operations with an optional time-to-live. Stores are expected to be safe for
//! concurrent use; atomicity is per key, last writer wins.
//!
//! - [`MemoryStore`]: process-local `HashMap` behind a `tokio` `RwLock`.
//! - [`FileStore`]: one JSON file per key, survives restarts (used by the CLI).

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Keyed storage for cached CMS responses.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value stored under `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key`. `None` means no expiry.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove `key`. Returns whether something was removed.
    async fn forget(&self, key: &str) -> Result<bool>;

    /// Whether `key` holds an unexpired value.
    async fn has(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
