//! Background refresh for the Deferred strategy.
//!
//! A Deferred read never waits on the CMS once a value is cached. Instead the
//! [`RefreshCoordinator`] enqueues at most one [`RefreshJob`] per key and UTC
//! day on a [`JobQueue`], and a [`RefreshWorker`] executes the jobs and
//! overwrites the cached value.
//!
//! The job carries everything needed to repeat the request (credentials,
//! rewrite settings), so a worker can run in another process when the queue is
//! backed by external infrastructure.

use crate::key::last_update_key;
use crate::{
    ApiFetcher, CacheStore, Clock, Error, FailureMode, QueryParams, Result, Transport,
    UrlRewriteMode,
};
use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Command to re-fetch one cached request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshJob {
    /// Key the refreshed value is stored under.
    pub cache_key: String,
    /// Endpoint relative to the base URL.
    pub endpoint: String,
    /// Query parameters of the original request.
    #[serde(default)]
    pub query: QueryParams,
    /// Whether relative asset URLs are rewritten.
    #[serde(default)]
    pub full_urls: bool,
    /// Rewrite mode used when `full_urls` is set.
    #[serde(default)]
    pub url_rewrite: UrlRewriteMode,
    /// CMS base URL.
    pub base_url: String,
    /// API token; empty for public content.
    #[serde(default)]
    pub token: String,
    /// Log requests made by the worker.
    #[serde(default)]
    pub debug: bool,
}

impl RefreshJob {
    /// Serialize for an external queue.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a job taken off an external queue.
    pub fn from_json(payload: &str) -> Result<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}

/// Destination for refresh jobs.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Submit a job. Delivery semantics are up to the implementation.
    async fn enqueue(&self, job: RefreshJob) -> Result<()>;
}

/// In-process queue backed by an unbounded `tokio` channel.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::UnboundedSender<RefreshJob>,
}

impl ChannelQueue {
    /// Queue plus the receiving end to hand to [`RefreshWorker::run`].
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RefreshJob>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn enqueue(&self, job: RefreshJob) -> Result<()> {
        self.sender.send(job).map_err(|e| {
            Error::Queue(format!(
                "refresh worker is gone, dropped job for {}",
                e.0.endpoint
            ))
        })
    }
}

/// Executes refresh jobs against the CMS and stores the results.
pub struct RefreshWorker {
    transport: Arc<dyn Transport>,
    store: Arc<dyn CacheStore>,
}

impl RefreshWorker {
    /// Worker writing into `store`.
    pub fn new(transport: Arc<dyn Transport>, store: Arc<dyn CacheStore>) -> Self {
        Self { transport, store }
    }

    /// Run one job. Returns whether a fresh value was stored.
    ///
    /// CMS and transport failures are logged and leave the cached value in
    /// place; only a failing store is reported as an error.
    pub async fn handle(&self, job: &RefreshJob) -> Result<bool> {
        let fetcher = ApiFetcher::new(
            Arc::clone(&self.transport),
            job.base_url.as_str(),
            job.token.as_str(),
            job.url_rewrite,
        )
        .with_debug(job.debug);

        let Some(value) = fetcher
            .fetch_with(&job.endpoint, &job.query, job.full_urls, FailureMode::Log)
            .await?
        else {
            return Ok(false);
        };

        self.store.set(&job.cache_key, value, None).await?;
        debug!(endpoint = %job.endpoint, key = %job.cache_key, "Refreshed cached response");
        Ok(true)
    }

    /// Process jobs until every sender is dropped. Returns how many jobs
    /// stored a fresh value.
    pub async fn run(&self, mut receiver: mpsc::UnboundedReceiver<RefreshJob>) -> usize {
        let mut refreshed = 0;
        while let Some(job) = receiver.recv().await {
            match self.handle(&job).await {
                Ok(true) => refreshed += 1,
                Ok(false) => {},
                Err(e) => warn!(endpoint = %job.endpoint, "Refresh job failed: {}", e),
            }
        }
        refreshed
    }
}

/// Decides when a Deferred read should schedule a refresh.
pub struct RefreshCoordinator {
    queue: Arc<dyn JobQueue>,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    timestamp_ttl: Duration,
}

impl RefreshCoordinator {
    /// Coordinator recording refresh times in `store` for `timestamp_ttl`.
    pub fn new(
        queue: Arc<dyn JobQueue>,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        timestamp_ttl: Duration,
    ) -> Self {
        Self {
            queue,
            store,
            clock,
            timestamp_ttl,
        }
    }

    /// Enqueue `job` unless a refresh was already triggered today (UTC).
    ///
    /// Returns whether the job was enqueued. A rejected enqueue is logged and
    /// leaves the last-update timestamp alone so the next read retries.
    pub async fn schedule(&self, job: RefreshJob) -> Result<bool> {
        let stamp_key = last_update_key(&job.cache_key);
        let now = self.clock.now();

        let last_update = self
            .store
            .get(&stamp_key)
            .await?
            .and_then(|value| value.as_i64())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));

        if last_update.is_some_and(|last| last.date_naive() >= now.date_naive()) {
            return Ok(false);
        }

        let endpoint = job.endpoint.clone();
        if let Err(e) = self.queue.enqueue(job).await {
            warn!(endpoint = %endpoint, category = e.category(), "Failed to enqueue refresh: {}", e);
            return Ok(false);
        }

        self.store
            .set(&stamp_key, json!(now.timestamp()), Some(self.timestamp_ttl))
            .await?;
        info!(endpoint = %endpoint, "Queued background refresh");
        Ok(true)
    }
}
