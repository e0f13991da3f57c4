//! The caching Strapi client.
//!
//! [`StrapiClient`] exposes the CMS read operations (collections, counts,
//! entries, single types) behind a per-call [`CacheType`], plus uncached
//! writes. Collaborators (transport, store, queue, clock) are injected
//! through [`StrapiClientBuilder`]; anything not supplied gets a default.
//!
//! ## Example
//!
//! ```rust,no_run
//! use strapi_cache_core::{Config, QueryParams, RequestOptions, StrapiClient};
//!
//! # async fn demo() -> strapi_cache_core::Result<()> {
//! let client = StrapiClient::new(Config::new("https://cms.example.com/api"))?;
//!
//! let params = QueryParams::new().with("populate", "*");
//! let articles = client
//!     .collection("articles", &params, RequestOptions::new().full_urls(true))
//!     .await?;
//! println!("{articles}");
//! # Ok(())
//! # }
//! ```

use crate::key::{created_key, last_update_key};
use crate::query::{PAGINATION, SORT};
use crate::refresh::RefreshCoordinator;
use crate::{
    ApiFetcher, CacheKeyBuilder, CacheStore, CacheType, Clock, Config, FailureMode, HttpMethod,
    JobQueue, MemoryStore, QueryParams, RefreshJob, RequestOptions, ReqwestTransport, Result,
    SystemClock, Transport,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::{Arc, Mutex, Once, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

static DEFERRED_FALLBACK: Once = Once::new();

/// Assembles a [`StrapiClient`] from a [`Config`] and optional collaborators.
pub struct StrapiClientBuilder {
    config: Config,
    transport: Option<Arc<dyn Transport>>,
    store: Option<Arc<dyn CacheStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    clock: Option<Arc<dyn Clock>>,
}

impl StrapiClientBuilder {
    /// HTTP transport; defaults to [`ReqwestTransport`] with the configured
    /// timeout.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Cache store; defaults to a [`MemoryStore`] on the client's clock.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Queue for Deferred refresh jobs. Without one, Deferred reads behave
    /// like Normal reads.
    #[must_use]
    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Time source; defaults to [`SystemClock`].
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<StrapiClient> {
        let config = self.config;
        config.validate()?;
        let default_cache = config.cache_type()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::with_timeout(config.timeout())?),
        };
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::with_clock(Arc::clone(&clock))));

        let fetcher = ApiFetcher::new(
            transport,
            config.url.as_str(),
            config.token.as_str(),
            config.url_rewrite,
        )
        .with_debug(config.debug);
        let keys = CacheKeyBuilder::new(fetcher.base_url());
        let refresh = self.queue.map(|queue| {
            RefreshCoordinator::new(
                queue,
                Arc::clone(&store),
                Arc::clone(&clock),
                config.cache_ttl(),
            )
        });

        Ok(StrapiClient {
            config,
            default_cache,
            fetcher,
            keys,
            store,
            clock,
            refresh,
            background: Arc::new(BackgroundRefreshes::default()),
        })
    }
}

/// Flexible refreshes running on the tokio runtime.
///
/// Tasks are detached: dropping the client does not cancel them.
#[derive(Default)]
struct BackgroundRefreshes {
    in_flight: Mutex<HashSet<String>>,
    tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl BackgroundRefreshes {
    /// Claim `key`; false if a refresh for it is already running.
    fn claim(&self, key: &str) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string())
    }

    fn release(&self, key: &str) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Releases an in-flight claim when the refresh task ends, panics included.
struct InFlightGuard {
    refreshes: Arc<BackgroundRefreshes>,
    key: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.refreshes.release(&self.key);
    }
}

/// Caching client for one Strapi instance.
///
/// Flexible background refreshes keep running after the client is dropped;
/// call [`drain_background`](Self::drain_background) to wait for them.
pub struct StrapiClient {
    config: Config,
    default_cache: CacheType,
    fetcher: ApiFetcher,
    keys: CacheKeyBuilder,
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    refresh: Option<RefreshCoordinator>,
    background: Arc<BackgroundRefreshes>,
}

impl StrapiClient {
    /// Client with default collaborators.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start building a client.
    #[must_use]
    pub fn builder(config: Config) -> StrapiClientBuilder {
        StrapiClientBuilder {
            config,
            transport: None,
            store: None,
            queue: None,
            clock: None,
        }
    }

    /// Configuration the client was built from.
    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Strategy used when a call does not override it.
    #[must_use]
    pub const fn default_cache_type(&self) -> CacheType {
        self.default_cache
    }

    /// Fetch a collection type.
    ///
    /// `sort` and `pagination` default to the configured values unless the
    /// caller sets them.
    pub async fn collection(
        &self,
        name: &str,
        params: &QueryParams,
        options: RequestOptions,
    ) -> Result<Value> {
        let params = self.collection_params(params);
        self.cached_get(name, &params, options).await
    }

    /// Count the entries of a collection type (`<name>/count`).
    pub async fn collection_count(
        &self,
        name: &str,
        params: &QueryParams,
        options: RequestOptions,
    ) -> Result<Value> {
        self.cached_get(&format!("{name}/count"), params, options)
            .await
    }

    /// Fetch one entry of a collection type.
    pub async fn entry(
        &self,
        name: &str,
        id: impl Display + Send,
        params: &QueryParams,
        options: RequestOptions,
    ) -> Result<Value> {
        self.cached_get(&format!("{name}/{id}"), params, options)
            .await
    }

    /// Fetch a single type.
    pub async fn single(
        &self,
        name: &str,
        params: &QueryParams,
        options: RequestOptions,
    ) -> Result<Value> {
        self.cached_get(name, params, options).await
    }

    /// Create an entry. Never cached.
    pub async fn create(&self, name: &str, data: Value) -> Result<Value> {
        info!(endpoint = name, "Creating Strapi entry");
        self.fetcher.send_json(HttpMethod::Post, name, data).await
    }

    /// Update an entry. Never cached; cached reads of it are not invalidated.
    pub async fn update(&self, name: &str, id: impl Display + Send, data: Value) -> Result<Value> {
        let endpoint = format!("{name}/{id}");
        info!(endpoint = %endpoint, "Updating Strapi entry");
        self.fetcher
            .send_json(HttpMethod::Put, &endpoint, data)
            .await
    }

    /// Drop the cached response for a request, with its bookkeeping keys.
    ///
    /// `endpoint` and `params` must match the request as sent; use
    /// [`collection_params`](Self::collection_params) for collections.
    /// Returns whether a cached response was removed.
    pub async fn forget(
        &self,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
    ) -> Result<bool> {
        let key = self.keys.build(endpoint, params, full_urls);
        self.store.forget(&last_update_key(&key)).await?;
        self.store.forget(&created_key(&key)).await?;
        let removed = self.store.forget(&key).await?;
        debug!(endpoint, removed, "Forgot cached response");
        Ok(removed)
    }

    /// `params` with the collection defaults applied.
    #[must_use]
    pub fn collection_params(&self, params: &QueryParams) -> QueryParams {
        let mut params = params.clone();
        if !params.contains_key(SORT) {
            params.insert(SORT, self.config.default_sort());
        }
        if !params.contains_key(PAGINATION) {
            params.insert_path("pagination[start]", self.config.pagination_start);
            params.insert_path("pagination[limit]", self.config.pagination_limit);
        }
        params
    }

    /// Cache key a read would use.
    #[must_use]
    pub fn cache_key(&self, endpoint: &str, params: &QueryParams, full_urls: bool) -> String {
        self.keys.build(endpoint, params, full_urls)
    }

    /// Wait for every Flexible background refresh started so far, including
    /// ones spawned while waiting.
    pub async fn drain_background(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.background.tasks.lock().await);
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("Background refresh task failed: {}", e);
                }
            }
        }
    }

    async fn cached_get(
        &self,
        endpoint: &str,
        params: &QueryParams,
        options: RequestOptions,
    ) -> Result<Value> {
        let full_urls = options.full_urls.unwrap_or(self.config.full_urls);
        let key = self.keys.build(endpoint, params, full_urls);
        let strategy = options.resolve(self.default_cache);
        strategy.validate()?;

        let result = match strategy {
            CacheType::Disabled => {
                self.store.forget(&key).await?;
                self.fetch(endpoint, params, full_urls).await
            },
            CacheType::Normal(ttl) => {
                self.cache_aside(&key, endpoint, params, full_urls, Some(ttl))
                    .await
            },
            CacheType::Forever => {
                self.cache_aside(&key, endpoint, params, full_urls, None)
                    .await
            },
            CacheType::Deferred => {
                let fallback_ttl = options.cache_time.unwrap_or_else(|| self.config.cache_time());
                self.deferred(&key, endpoint, params, full_urls, fallback_ttl)
                    .await
            },
            CacheType::Flexible { fresh, total } => {
                self.flexible(&key, endpoint, params, full_urls, fresh, total)
                    .await
            },
        };

        if let Err(e) = &result {
            if let Err(forget_err) = self.store.forget(&key).await {
                warn!(key = %key, "Failed to forget cache entry after error: {}", forget_err);
            }
            debug!(endpoint, category = e.category(), strategy = %strategy.kind(), "Read failed");
        }
        result
    }

    async fn fetch(&self, endpoint: &str, params: &QueryParams, full_urls: bool) -> Result<Value> {
        info!(endpoint, "Fetching from Strapi");
        self.fetcher
            .fetch(endpoint, params, full_urls)
            .await?
            .into_result(endpoint)
    }

    async fn cache_aside(
        &self,
        key: &str,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
        ttl: Option<Duration>,
    ) -> Result<Value> {
        if let Some(cached) = self.store.get(key).await? {
            debug!(endpoint, "Cache hit");
            return Ok(cached);
        }
        debug!(endpoint, "Cache miss");

        let value = self.fetch(endpoint, params, full_urls).await?;
        self.store.set(key, value.clone(), ttl).await?;
        Ok(value)
    }

    async fn deferred(
        &self,
        key: &str,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
        fallback_ttl: Duration,
    ) -> Result<Value> {
        let Some(refresh) = &self.refresh else {
            DEFERRED_FALLBACK.call_once(|| {
                warn!("Deferred caching requested without a job queue; using normal caching");
            });
            return self
                .cache_aside(key, endpoint, params, full_urls, Some(fallback_ttl))
                .await;
        };

        let job = RefreshJob {
            cache_key: key.to_string(),
            endpoint: endpoint.to_string(),
            query: params.clone(),
            full_urls,
            url_rewrite: self.fetcher.rewrite_mode(),
            base_url: self.fetcher.base_url().to_string(),
            token: self.fetcher.token().to_string(),
            debug: self.fetcher.debug(),
        };
        refresh.schedule(job).await?;

        if let Some(cached) = self.store.get(key).await? {
            debug!(endpoint, "Cache hit");
            return Ok(cached);
        }

        debug!(endpoint, "Cold deferred cache, fetching synchronously");
        let value = self.fetch(endpoint, params, full_urls).await?;
        self.store.set(key, value.clone(), None).await?;
        Ok(value)
    }

    async fn flexible(
        &self,
        key: &str,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
        fresh: Duration,
        total: Duration,
    ) -> Result<Value> {
        let stamp_key = created_key(key);
        let cached = self.store.get(key).await?;
        let created = self
            .store
            .get(&stamp_key)
            .await?
            .and_then(|value| value.as_i64());

        if let (Some(value), Some(created)) = (cached, created) {
            let age = self.clock.timestamp().saturating_sub(created).max(0);
            if age < secs(fresh) {
                debug!(endpoint, age, "Cache hit (fresh)");
                return Ok(value);
            }
            if age < secs(total) {
                debug!(endpoint, age, "Cache hit (stale), refreshing in background");
                self.spawn_refresh(key, endpoint, params, full_urls, total)
                    .await;
                return Ok(value);
            }
        }
        debug!(endpoint, "Cache miss");

        let value = self.fetch(endpoint, params, full_urls).await?;
        store_flexible(self.store.as_ref(), self.clock.as_ref(), key, &value, total).await?;
        Ok(value)
    }

    async fn spawn_refresh(
        &self,
        key: &str,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
        total: Duration,
    ) {
        if !self.background.claim(key) {
            debug!(endpoint, "Background refresh already in flight");
            return;
        }

        let guard = InFlightGuard {
            refreshes: Arc::clone(&self.background),
            key: key.to_string(),
        };
        let fetcher = self.fetcher.clone();
        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let endpoint = endpoint.to_string();
        let params = params.clone();

        let mut tasks = self.background.tasks.lock().await;
        tasks.retain(|task| !task.is_finished());
        tasks.push(tokio::spawn(async move {
            let key = guard.key.as_str();
            let Ok(Some(value)) = fetcher
                .fetch_with(&endpoint, &params, full_urls, FailureMode::Log)
                .await
            else {
                return;
            };
            match store_flexible(store.as_ref(), clock.as_ref(), key, &value, total).await {
                Ok(()) => debug!(endpoint = %endpoint, "Background refresh stored"),
                Err(e) => warn!(endpoint = %endpoint, "Background refresh could not store: {}", e),
            }
        }));
    }
}

async fn store_flexible(
    store: &dyn CacheStore,
    clock: &dyn Clock,
    key: &str,
    value: &Value,
    total: Duration,
) -> Result<()> {
    store.set(key, value.clone(), Some(total)).await?;
    store
        .set(&created_key(key), json!(clock.timestamp()), Some(total))
        .await
}

fn secs(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{Error, HttpRequest, HttpResponse};
    use async_trait::async_trait;

    struct FixedTransport(Mutex<Vec<HttpRequest>>);

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            self.0.lock().unwrap().push(request);
            Ok(HttpResponse::new(200, r#"{"data":[]}"#))
        }
    }

    fn client(config: Config) -> (Arc<FixedTransport>, StrapiClient) {
        let transport = Arc::new(FixedTransport(Mutex::new(Vec::new())));
        let client = StrapiClient::builder(config)
            .transport(transport.clone())
            .build()
            .unwrap();
        (transport, client)
    }

    #[test]
    fn test_collection_params_defaults() {
        let (_, client) = client(Config::new("https://cms.test"));

        let params = client.collection_params(&QueryParams::new());
        let pairs = params.to_pairs();
        assert!(pairs.contains(&("sort".into(), "id:desc".into())));
        assert!(pairs.contains(&("pagination[start]".into(), "0".into())));
        assert!(pairs.contains(&("pagination[limit]".into(), "25".into())));
    }

    #[test]
    fn test_collection_params_respect_caller() {
        let (_, client) = client(Config::new("https://cms.test"));

        let mut given = QueryParams::new().with("sort", "title:asc");
        given.insert_path("pagination[page]", 2_i64);
        let pairs = client.collection_params(&given).to_pairs();

        assert_eq!(
            pairs,
            vec![
                ("pagination[page]".to_string(), "2".to_string()),
                ("sort".to_string(), "title:asc".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = StrapiClient::builder(Config::default()).build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_count_and_entry_endpoints() -> anyhow::Result<()> {
        let (transport, client) = client(Config::new("https://cms.test/api/"));

        client
            .collection_count("articles", &QueryParams::new(), RequestOptions::new())
            .await?;
        client
            .entry("articles", 7, &QueryParams::new(), RequestOptions::new())
            .await?;

        let urls: Vec<String> = transport
            .0
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.clone())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://cms.test/api/articles/count",
                "https://cms.test/api/articles/7"
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_forget_reports_removal() -> anyhow::Result<()> {
        let (_, client) = client(Config::new("https://cms.test"));
        let params = QueryParams::new();

        client
            .single("homepage", &params, RequestOptions::new())
            .await?;
        assert!(client.forget("homepage", &params, false).await?);
        assert!(!client.forget("homepage", &params, false).await?);
        Ok(())
    }
}
