//! Client configuration.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. A TOML file ([`Config::load`], or [`Config::load_default`] for the
//!    platform config directory)
//! 3. `STRAPI_*` environment variables ([`Config::apply_env`])
//!
//! ## Example
//!
//! ```rust
//! use strapi_cache_core::{CacheType, Config};
//! use std::time::Duration;
//!
//! let config: Config = toml::from_str(r#"
//!     url = "https://cms.example.com/api"
//!     cache_type = "flexible"
//!     flexible_cache = [60, 300]
//! "#)?;
//! config.validate()?;
//!
//! assert_eq!(
//!     config.cache_type()?,
//!     CacheType::Flexible { fresh: Duration::from_secs(60), total: Duration::from_secs(300) },
//! );
//! # Ok::<(), strapi_cache_core::Error>(())
//! ```

use crate::{CacheKind, CacheType, Error, Result, UrlRewriteMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Queue connection value that runs refresh jobs inside the current process.
pub const LOCAL_QUEUE: &str = "local";

/// Settings for a [`StrapiClient`](crate::StrapiClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the Strapi REST API, e.g. `https://cms.example.com/api`.
    pub url: String,
    /// API token sent as a bearer token. Empty for public content.
    pub token: String,
    /// Default strategy: `disabled`, `normal`, `forever`, `deferred` or
    /// `flexible`.
    pub cache_type: String,
    /// TTL in seconds for the `normal` strategy.
    pub cache_time: u64,
    /// Lifetime in seconds of Deferred last-update timestamps.
    pub cache_ttl: u64,
    /// `[fresh, total]` windows in seconds for the `flexible` strategy.
    pub flexible_cache: [u64; 2],
    /// Queue used for Deferred refresh jobs (`local` for in-process).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_connection: Option<String>,
    /// Rewrite relative asset URLs by default.
    pub full_urls: bool,
    /// How relative URLs are found in responses.
    pub url_rewrite: UrlRewriteMode,
    /// Default sort field for collections.
    pub sort_field: String,
    /// Default sort order for collections (`asc` or `desc`).
    pub sort_order: String,
    /// Default `pagination[start]` for collections.
    pub pagination_start: u64,
    /// Default `pagination[limit]` for collections.
    pub pagination_limit: u64,
    /// Log every request and response status.
    pub debug: bool,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            cache_type: CacheKind::Normal.to_string(),
            cache_time: 3600,
            cache_ttl: 86_400,
            flexible_cache: [300, 600],
            queue_connection: None,
            full_urls: false,
            url_rewrite: UrlRewriteMode::UrlKey,
            sort_field: "id".to_string(),
            sort_order: "desc".to_string(),
            pagination_start: 0,
            pagination_limit: 25,
            debug: false,
            timeout_secs: 30,
        }
    }
}

impl Config {
    /// Configuration for `url` with every other setting at its default.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Load a TOML config file. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML for
    /// this structure.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Load from the platform config directory, or defaults when no file
    /// exists there.
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {e}")))?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {e}")))?;
        fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {e}")))?;
        Ok(())
    }

    /// Platform location of the config file.
    ///
    /// - Linux: `~/.config/strapi-cache/config.toml`
    /// - macOS: `~/Library/Application Support/dev.outfitter.strapi-cache/config.toml`
    /// - Windows: `%APPDATA%\outfitter\strapi-cache\config\config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("dev", "outfitter", "strapi-cache")
            .ok_or_else(|| Error::Config("Failed to determine project directories".into()))?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Overlay `STRAPI_*` environment variables.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Overlay variables resolved through `lookup` instead of the process
    /// environment.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(v) = get("STRAPI_URL") {
            self.url = v;
        }
        if let Some(v) = get("STRAPI_TOKEN") {
            self.token = v;
        }
        if let Some(v) = get("STRAPI_CACHE_TYPE") {
            self.cache_type = v;
        }
        if let Some(v) = get("STRAPI_CACHE_TIME") {
            self.cache_time = parse_number("STRAPI_CACHE_TIME", &v)?;
        }
        if let Some(v) = get("STRAPI_CACHE_TTL") {
            self.cache_ttl = parse_number("STRAPI_CACHE_TTL", &v)?;
        }
        if let Some(v) = get("STRAPI_FLEXIBLE_CACHE") {
            self.flexible_cache = parse_window(&v)?;
        }
        if let Some(v) = get("STRAPI_QUEUE_CONNECTION") {
            self.queue_connection = Some(v);
        }
        if let Some(v) = get("STRAPI_FULL_URLS") {
            self.full_urls = parse_bool("STRAPI_FULL_URLS", &v)?;
        }
        if let Some(v) = get("STRAPI_URL_REWRITE") {
            self.url_rewrite = match v.trim().to_ascii_lowercase().as_str() {
                "url_key" => UrlRewriteMode::UrlKey,
                "markdown_image" => UrlRewriteMode::MarkdownImage,
                other => {
                    return Err(Error::Config(format!(
                        "STRAPI_URL_REWRITE must be 'url_key' or 'markdown_image', got '{other}'"
                    )));
                },
            };
        }
        if let Some(v) = get("STRAPI_SORT_FIELD") {
            self.sort_field = v;
        }
        if let Some(v) = get("STRAPI_SORT_ORDER") {
            self.sort_order = v;
        }
        if let Some(v) = get("STRAPI_PAGINATION_START") {
            self.pagination_start = parse_number("STRAPI_PAGINATION_START", &v)?;
        }
        if let Some(v) = get("STRAPI_PAGINATION_LIMIT") {
            self.pagination_limit = parse_number("STRAPI_PAGINATION_LIMIT", &v)?;
        }
        if let Some(v) = get("STRAPI_DEBUG") {
            self.debug = parse_bool("STRAPI_DEBUG", &v)?;
        }
        if let Some(v) = get("STRAPI_TIMEOUT") {
            self.timeout_secs = parse_number("STRAPI_TIMEOUT", &v)?;
        }
        Ok(())
    }

    /// Check that the configuration can drive a client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the URL is missing or not absolute,
    /// the cache type is unknown, or the flexible window is inverted.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config(
                "Strapi URL is not set (set `url` or STRAPI_URL)".into(),
            ));
        }
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("Invalid Strapi URL '{}': {e}", self.url)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Strapi URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        self.cache_type()?;
        Ok(())
    }

    /// Default strategy described by this configuration.
    pub fn cache_type(&self) -> Result<CacheType> {
        let kind: CacheKind = self.cache_type.parse()?;
        Ok(match kind {
            CacheKind::Disabled => CacheType::Disabled,
            CacheKind::Normal => CacheType::Normal(self.cache_time()),
            CacheKind::Forever => CacheType::Forever,
            CacheKind::Deferred => CacheType::Deferred,
            CacheKind::Flexible => {
                let [fresh, total] = self.flexible_cache;
                let strategy = CacheType::Flexible {
                    fresh: Duration::from_secs(fresh),
                    total: Duration::from_secs(total),
                };
                strategy.validate()?;
                strategy
            },
        })
    }

    /// Normal strategy TTL.
    #[must_use]
    pub const fn cache_time(&self) -> Duration {
        Duration::from_secs(self.cache_time)
    }

    /// Lifetime of Deferred last-update timestamps.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    /// HTTP request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Default collection sort, `field:order`.
    #[must_use]
    pub fn default_sort(&self) -> String {
        format!("{}:{}", self.sort_field, self.sort_order)
    }

    /// Whether Deferred jobs run in-process.
    #[must_use]
    pub fn uses_local_queue(&self) -> bool {
        self.queue_connection
            .as_deref()
            .is_some_and(|conn| conn.eq_ignore_ascii_case(LOCAL_QUEUE))
    }
}

fn parse_number(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a whole number, got '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{name} must be true or false, got '{value}'"
        ))),
    }
}

fn parse_window(value: &str) -> Result<[u64; 2]> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    match parts.as_slice() {
        [fresh, total] => Ok([
            parse_number("STRAPI_FLEXIBLE_CACHE", fresh)?,
            parse_number("STRAPI_FLEXIBLE_CACHE", total)?,
        ]),
        _ => Err(Error::Config(format!(
            "STRAPI_FLEXIBLE_CACHE must be 'fresh,total' in seconds, got '{value}'"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_type().unwrap(), CacheType::Normal(Duration::from_secs(3600)));
        assert_eq!(config.cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.flexible_cache, [300, 600]);
        assert_eq!(config.default_sort(), "id:desc");
        assert_eq!(config.pagination_limit, 25);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(!config.uses_local_queue());
    }

    #[test]
    fn test_env_overrides() -> Result<()> {
        let mut config = Config::default();
        config.apply_env_from(env(&[
            ("STRAPI_URL", "https://cms.test/api"),
            ("STRAPI_TOKEN", "secret"),
            ("STRAPI_CACHE_TYPE", "flexible"),
            ("STRAPI_FLEXIBLE_CACHE", " 10, 20 "),
            ("STRAPI_FULL_URLS", "yes"),
            ("STRAPI_URL_REWRITE", "markdown_image"),
            ("STRAPI_QUEUE_CONNECTION", "LOCAL"),
            ("STRAPI_PAGINATION_LIMIT", "100"),
            ("STRAPI_SORT_ORDER", "asc"),
            ("STRAPI_DEBUG", ""),
        ]))?;

        config.validate()?;
        assert_eq!(config.token, "secret");
        assert!(config.full_urls);
        assert!(!config.debug);
        assert!(config.uses_local_queue());
        assert_eq!(config.url_rewrite, UrlRewriteMode::MarkdownImage);
        assert_eq!(config.default_sort(), "id:asc");
        assert_eq!(
            config.cache_type()?,
            CacheType::Flexible {
                fresh: Duration::from_secs(10),
                total: Duration::from_secs(20)
            }
        );
        Ok(())
    }

    #[test]
    fn test_env_rejects_garbage() {
        for pairs in [
            [("STRAPI_CACHE_TIME", "soon")],
            [("STRAPI_FULL_URLS", "maybe")],
            [("STRAPI_FLEXIBLE_CACHE", "300")],
            [("STRAPI_URL_REWRITE", "everything")],
        ] {
            let result = Config::default().apply_env_from(env(&pairs));
            assert!(matches!(result, Err(Error::Config(_))), "{pairs:?}");
        }
    }

    #[test]
    fn test_validate_failures() {
        assert!(matches!(Config::default().validate(), Err(Error::Config(_))));
        assert!(Config::new("not a url").validate().is_err());
        assert!(Config::new("ftp://cms.test").validate().is_err());

        let mut unknown = Config::new("https://cms.test");
        unknown.cache_type = "sometimes".into();
        assert!(unknown.validate().is_err());

        let mut inverted = Config::new("https://cms.test");
        inverted.cache_type = "flexible".into();
        inverted.flexible_cache = [600, 600];
        let err = inverted.validate().unwrap_err();
        assert!(err.to_string().contains("shorter"));
    }

    #[test]
    fn test_save_and_load_roundtrip() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::new("https://cms.test/api");
        config.cache_type = "deferred".into();
        config.queue_connection = Some("local".into());
        config.save(&path)?;

        assert_eq!(Config::load(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.toml");
        fs::write(&path, "url = \"https://cms.test\"\ncache_time = 60\n")?;

        let config = Config::load(&path)?;
        assert_eq!(config.cache_type()?, CacheType::Normal(Duration::from_secs(60)));
        assert_eq!(config.sort_field, "id");
        Ok(())
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "url = [unterminated").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    proptest! {
        #[test]
        fn test_flexible_window_ordering(fresh in 0u64..10_000, total in 0u64..10_000) {
            let mut config = Config::new("https://cms.test");
            config.cache_type = "flexible".into();
            config.flexible_cache = [fresh, total];
            prop_assert_eq!(config.validate().is_ok(), fresh < total);
        }
    }
}
