//! Cache key derivation.
//!
//! Keys are `strapi-cache.` followed by the unpadded URL-safe base64 of a
//! SHA-256 digest over the request identity: base URL, endpoint, canonical
//! query string and the URL-rewrite flag. Each field is length-prefixed before
//! hashing so that moving characters between adjacent fields changes the key.

use crate::QueryParams;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

/// Prefix shared by every primary cache key.
pub const KEY_PREFIX: &str = "strapi-cache.";

const LAST_UPDATE_SUFFIX: &str = "-last-update";
const CREATED_SUFFIX: &str = "-created";

/// Derives cache keys for CMS requests against one base URL.
#[derive(Debug, Clone)]
pub struct CacheKeyBuilder {
    base_url: String,
}

impl CacheKeyBuilder {
    /// Builder for requests against `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Base URL folded into every key.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Key for a request.
    #[must_use]
    pub fn build(&self, endpoint: &str, params: &QueryParams, full_urls: bool) -> String {
        let query = params.canonical();
        let mut hasher = Sha256::new();
        for field in [
            self.base_url.as_bytes(),
            endpoint.as_bytes(),
            query.as_bytes(),
        ] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field);
        }
        hasher.update([u8::from(full_urls)]);

        format!("{KEY_PREFIX}{}", URL_SAFE_NO_PAD.encode(hasher.finalize()))
    }
}

/// Companion key holding the last time a deferred refresh was triggered.
#[must_use]
pub fn last_update_key(cache_key: &str) -> String {
    format!("{cache_key}{LAST_UPDATE_SUFFIX}")
}

/// Companion key holding when a flexible entry was last written.
#[must_use]
pub fn created_key(cache_key: &str) -> String {
    format!("{cache_key}{CREATED_SUFFIX}")
}
