use super::CacheStore;
use crate::{Clock, Error, Result, SystemClock};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct FileEntry {
    value: Value,
    /// Unix timestamp (seconds); absent for entries without expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<i64>,
}

/// Cache store keeping one JSON file per key under a root directory.
pub struct FileStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_clock(root, Arc::new(SystemClock))
    }

    /// Store with a custom clock for expiry decisions.
    pub fn with_clock(root: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            root: root.into(),
            clock,
        }
    }

    /// Platform cache directory for strapi-cache.
    ///
    /// - Linux: `~/.cache/strapi-cache`
    /// - macOS: `~/Library/Caches/dev.outfitter.strapi-cache`
    /// - Windows: `%LOCALAPPDATA%\outfitter\strapi-cache\cache`
    pub fn default_root() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "outfitter", "strapi-cache")
            .ok_or_else(|| Error::Cache("Failed to determine cache directory".into()))?;
        Ok(dirs.cache_dir().to_path_buf())
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Delete every cached file. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut removed = 0;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Map a cache key onto a safe file name.
///
/// Generated keys are already URL-safe base64; anything else is reduced to a
/// conservative character set so a key can never escape the root directory.
fn sanitize_key(key: &str) -> String {
    let mut sanitized: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "_");
    }
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

#[async_trait]
impl CacheStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let path = self.path_for(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: FileEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable cache file {}: {}", path.display(), e);
                self.forget(key).await?;
                return Ok(None);
            },
        };

        if entry
            .expires_at
            .is_some_and(|at| at <= self.clock.timestamp())
        {
            debug!("Cache file {} expired", path.display());
            self.forget(key).await?;
            return Ok(None);
        }

        Ok(Some(entry.value))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        let expires_at = ttl.map(|ttl| {
            let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
            self.clock.timestamp().saturating_add(secs)
        });
        let bytes = serde_json::to_vec(&FileEntry { value, expires_at })?;

        // Each write gets its own temp file so concurrent writers never
        // rename each other's half-written data.
        let root = self.root.clone();
        let path = self.path_for(key);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&root)?;
            tmp.write_all(&bytes)?;
            tmp.persist(&path)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Cache(format!("Cache write task failed: {e}")))??;
        Ok(())
    }

    async fn forget(&self, key: &str) -> Result<bool> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
