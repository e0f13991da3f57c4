//! Cache strategies and per-request strategy resolution.
//!
//! Every cached read runs under exactly one [`CacheType`]:
//!
//! | Strategy | Cache hit | Cache miss |
//! |----------|-----------|------------|
//! | **Disabled** | Forgotten | Fetch, never stored |
//! | **Normal** | Returned until the TTL lapses | Fetch, store with TTL |
//! | **Forever** | Returned until forgotten | Fetch, store without expiry |
//! | **Flexible** | Fresh: returned. Stale: returned + background refresh | Fetch, store |
//! | **Deferred** | Returned; refresh jobs enqueued once per day | Fetch once, store forever |
//!
//! The configured default is overridden per call through [`RequestOptions`].

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Caching behavior applied to a single read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheType {
    /// Always fetch; any cached value for the key is forgotten.
    Disabled,
    /// Cache-aside with a time-to-live.
    Normal(Duration),
    /// Cache-aside without expiry.
    Forever,
    /// Serve what is cached and let background jobs refresh it.
    Deferred,
    /// Stale-while-revalidate.
    Flexible {
        /// Age below which a cached value is served without any refresh.
        fresh: Duration,
        /// Age at which a cached value is no longer served at all.
        total: Duration,
    },
}

impl CacheType {
    /// Name of the strategy, as used in configuration.
    #[must_use]
    pub const fn kind(&self) -> CacheKind {
        match self {
            Self::Disabled => CacheKind::Disabled,
            Self::Normal(_) => CacheKind::Normal,
            Self::Forever => CacheKind::Forever,
            Self::Deferred => CacheKind::Deferred,
            Self::Flexible { .. } => CacheKind::Flexible,
        }
    }

    /// Reject a flexible window whose fresh period is not shorter than its
    /// total period.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an inverted or empty flexible window.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Flexible { fresh, total } if fresh >= total => Err(Error::Config(format!(
                "flexible_cache fresh period ({}s) must be shorter than total ({}s)",
                fresh.as_secs(),
                total.as_secs()
            ))),
            _ => Ok(()),
        }
    }
}

/// Strategy names accepted by `cache_type` in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    /// See [`CacheType::Disabled`].
    Disabled,
    /// See [`CacheType::Normal`].
    #[default]
    Normal,
    /// See [`CacheType::Forever`].
    Forever,
    /// See [`CacheType::Deferred`].
    Deferred,
    /// See [`CacheType::Flexible`].
    Flexible,
}

impl CacheKind {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Normal => "normal",
            Self::Forever => "forever",
            Self::Deferred => "deferred",
            Self::Flexible => "flexible",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "none" | "off" => Ok(Self::Disabled),
            "normal" => Ok(Self::Normal),
            "forever" => Ok(Self::Forever),
            "deferred" => Ok(Self::Deferred),
            "flexible" => Ok(Self::Flexible),
            other => Err(Error::Config(format!(
                "Unknown cache type '{other}' (expected disabled, normal, forever, deferred or flexible)"
            ))),
        }
    }
}

/// Per-call overrides for cached reads.
///
/// Unset fields fall back to the client configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Rewrite relative asset URLs to absolute ones.
    pub full_urls: Option<bool>,
    /// TTL for the Normal strategy.
    pub cache_time: Option<Duration>,
    /// Strategy for this call.
    pub cache_type: Option<CacheType>,
}

impl RequestOptions {
    /// Options that defer entirely to the configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            full_urls: None,
            cache_time: None,
            cache_type: None,
        }
    }

    /// Override URL rewriting.
    #[must_use]
    pub const fn full_urls(mut self, enabled: bool) -> Self {
        self.full_urls = Some(enabled);
        self
    }

    /// Override the Normal strategy TTL.
    #[must_use]
    pub const fn cache_time(mut self, ttl: Duration) -> Self {
        self.cache_time = Some(ttl);
        self
    }

    /// Override the strategy.
    #[must_use]
    pub const fn cache_type(mut self, cache_type: CacheType) -> Self {
        self.cache_type = Some(cache_type);
        self
    }

    /// Resolve the strategy for a call given the configured default.
    ///
    /// A `cache_time` override only affects the Normal strategy.
    #[must_use]
    pub fn resolve(&self, default: CacheType) -> CacheType {
        let resolved = self.cache_type.unwrap_or(default);
        match (resolved, self.cache_time) {
            (CacheType::Normal(_), Some(ttl)) => CacheType::Normal(ttl),
            _ => resolved,
        }
    }
}
