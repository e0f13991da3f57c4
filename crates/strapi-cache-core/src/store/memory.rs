use super::CacheStore;
use crate::{Clock, Result, SystemClock};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Expired entries are swept on every this-many writes.
const PURGE_EVERY: u64 = 256;

#[derive(Debug, Clone)]
struct StoredEntry {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache store with lazy TTL expiry.
///
/// Expired entries are dropped when read, and swept periodically on write so
/// keys that are never read again do not accumulate.
pub struct MemoryStore {
    entries: RwLock<HashMap<String, StoredEntry>>,
    writes: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Store driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Store driven by a custom clock, so expiry follows simulated time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            writes: AtomicU64::new(0),
            clock,
        }
    }

    /// Number of stored entries, expired ones included until purged.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries at all.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        purge(&mut *self.entries.write().await, now)
    }

    /// Remove everything.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

fn purge(entries: &mut HashMap<String, StoredEntry>, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    let removed = before - entries.len();
    if removed > 0 {
        debug!("Purged {} expired cache entries", removed);
    }
    removed
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let now = self.clock.now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {},
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| entry.is_expired(now)) {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        let now = self.clock.now();
        let expires_at = ttl.map(|ttl| {
            let delta = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
            now.checked_add_signed(delta)
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });

        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), StoredEntry { value, expires_at });
        if self.writes.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            purge(&mut entries, now);
        }
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn clocked() -> (Arc<ManualClock>, MemoryStore) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        ));
        let store = MemoryStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_set_get_forget() -> anyhow::Result<()> {
        let (_, store) = clocked();

        store.set("k", json!({"a": 1}), None).await?;
        assert_eq!(store.get("k").await?, Some(json!({"a": 1})));
        assert!(store.has("k").await?);

        assert!(store.forget("k").await?);
        assert!(!store.forget("k").await?);
        assert_eq!(store.get("k").await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_ttl_expiration() -> anyhow::Result<()> {
        let (clock, store) = clocked();

        store
            .set("short", json!("v"), Some(Duration::from_secs(60)))
            .await?;
        store.set("forever", json!("v"), None).await?;

        clock.advance(Duration::from_secs(59));
        assert!(store.has("short").await?);

        clock.advance(Duration::from_secs(1));
        assert!(!store.has("short").await?);
        assert!(store.has("forever").await?);
        // expired entry was dropped on read
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_purge_expired() -> anyhow::Result<()> {
        let (clock, store) = clocked();
        for i in 0..3 {
            store
                .set(&format!("k{i}"), json!(i), Some(Duration::from_secs(10)))
                .await?;
        }
        store.set("keep", json!(true), None).await?;

        clock.advance(Duration::from_secs(11));
        assert_eq!(store.purge_expired().await, 3);
        assert_eq!(store.len().await, 1);

        store.clear().await;
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn test_writes_sweep_unread_expired_entries() -> anyhow::Result<()> {
        let (clock, store) = clocked();
        for i in 0..3 {
            store
                .set(&format!("old{i}"), json!(i), Some(Duration::from_secs(10)))
                .await?;
        }
        clock.advance(Duration::from_secs(11));

        for i in 3..PURGE_EVERY - 1 {
            store.set(&format!("k{i}"), json!(i), None).await?;
        }
        assert_eq!(store.len().await, usize::try_from(PURGE_EVERY - 1)?);

        store.set("last", json!(true), None).await?;
        assert_eq!(store.len().await, usize::try_from(PURGE_EVERY - 3)?);
        Ok(())
    }
}
