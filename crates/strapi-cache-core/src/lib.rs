//! # strapi-cache-core
//!
//! Caching client for the Strapi headless CMS REST API.
//!
//! Every read is keyed on the exact request (base URL, endpoint, query
//! parameters, URL rewriting) and served under one of five strategies:
//! disabled, normal TTL, forever, deferred (background jobs refresh once per
//! day) or flexible (stale-while-revalidate).
//!
//! ## Architecture
//!
//! - **Keys**: [`CacheKeyBuilder`] derives fixed-length, deterministic keys
//! - **Transform**: [`ResponseTransformer`] turns relative asset URLs absolute
//! - **Fetching**: [`ApiFetcher`] talks to the CMS through a [`Transport`] and
//!   classifies responses
//! - **Strategies**: [`StrapiClient`] combines the fetcher with a
//!   [`CacheStore`]
//! - **Refresh**: [`RefreshCoordinator`], [`RefreshJob`] and [`RefreshWorker`]
//!   implement deferred refreshes over a [`JobQueue`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use strapi_cache_core::{CacheType, Config, QueryParams, RequestOptions, StrapiClient};
//! use std::time::Duration;
//!
//! # async fn demo() -> strapi_cache_core::Result<()> {
//! let mut config = Config::new("https://cms.example.com/api");
//! config.token = "api-token".into();
//! let client = StrapiClient::new(config)?;
//!
//! let homepage = client
//!     .single(
//!         "homepage",
//!         &QueryParams::new().with("populate", "*"),
//!         RequestOptions::new().cache_type(CacheType::Normal(Duration::from_secs(60))),
//!     )
//!     .await?;
//! println!("{homepage}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust,no_run
//! use strapi_cache_core::{Error, QueryParams, RequestOptions, StrapiClient};
//!
//! # async fn demo(client: StrapiClient) {
//! match client.entry("articles", 42, &QueryParams::new(), RequestOptions::new()).await {
//!     Ok(article) => println!("{article}"),
//!     Err(Error::NotFound { .. }) => println!("no such article"),
//!     Err(e) if e.is_recoverable() => eprintln!("try again later: {e}"),
//!     Err(e) => eprintln!("failed: {e}"),
//! }
//! # }
//! ```

/// Caching client and strategy dispatch
pub mod client;
/// Time source used for TTLs and day boundaries
pub mod clock;
/// Client configuration from TOML and environment
pub mod config;
/// Error types and result aliases
pub mod error;
/// HTTP transport and response classification
pub mod fetcher;
/// Cache key derivation
pub mod key;
/// Query parameter model and serialization
pub mod query;
/// Deferred refresh jobs, queues and workers
pub mod refresh;
/// Cache store trait and bundled stores
pub mod store;
/// Cache strategies and per-call options
pub mod strategy;
/// Relative URL rewriting in responses
pub mod transform;

pub use client::{StrapiClient, StrapiClientBuilder};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, LOCAL_QUEUE};
pub use error::{Error, Result};
pub use fetcher::{
    ApiFetcher, FailureMode, FetchOutcome, HttpMethod, HttpRequest, HttpResponse,
    ReqwestTransport, Transport,
};
pub use key::{CacheKeyBuilder, KEY_PREFIX};
pub use query::{Filter, QueryParams, QueryValue};
pub use refresh::{ChannelQueue, JobQueue, RefreshCoordinator, RefreshJob, RefreshWorker};
pub use store::{CacheStore, FileStore, MemoryStore};
pub use strategy::{CacheKind, CacheType, RequestOptions};
pub use transform::{ResponseTransformer, UrlRewriteMode};
