//! Error types and handling for strapi-cache-core operations.
//!
//! The error type distinguishes the three outcomes a caller is expected to
//! branch on when the CMS misbehaves ([`Error::NotFound`],
//! [`Error::PermissionDenied`] and [`Error::UnknownError`]) from the plumbing
//! failures of the injected collaborators (transport, cache store, job queue).
//!
//! ## Error Categories
//!
//! - **CMS responses**: 404/null bodies, rejected requests, malformed payloads
//! - **Network Errors**: HTTP transport failures
//! - **Cache Errors**: failures reported by the cache store
//! - **Queue Errors**: failures reported by the background job queue
//! - **Configuration Errors**: invalid settings or config files
//!
//! ## Branching on CMS failures
//!
//! ```rust
//! use strapi_cache_core::Error;
//!
//! fn describe(err: &Error) -> String {
//!     match err {
//!         Error::NotFound { endpoint } => format!("nothing at {endpoint}"),
//!         Error::PermissionDenied { status, .. } => format!("rejected with {status}"),
//!         other => format!("{} failure: {other}", other.category()),
//!     }
//! }
//!
//! let err = Error::PermissionDenied { status: 403, endpoint: "articles".into() };
//! assert_eq!(describe(&err), "rejected with 403");
//! ```

use thiserror::Error;

/// The main error type for strapi-cache-core operations.
///
/// All fallible public functions return `Result<T, Error>`. The CMS variants
/// carry the endpoint (and status code where there is one) so callers can
/// report or branch without re-deriving the request.
#[derive(Error, Debug)]
pub enum Error {
    /// The CMS answered 404, or returned a `null` body for an entry or
    /// single-type lookup.
    #[error("Strapi returned no content for '{endpoint}'")]
    NotFound {
        /// Endpoint that was requested, relative to the base URL.
        endpoint: String,
    },

    /// The CMS rejected the request with a status code of 400 or above
    /// (other than 404).
    ///
    /// ## Common Causes
    ///
    /// - Missing or expired API token
    /// - Token without permission for the content type
    /// - Invalid query parameters (400)
    /// - CMS-side failure (5xx)
    #[error("Strapi returned a \"{status}\" status code for '{endpoint}'")]
    PermissionDenied {
        /// HTTP status code returned by the CMS.
        status: u16,
        /// Endpoint that was requested, relative to the base URL.
        endpoint: String,
    },

    /// The CMS answered successfully but the body is not a recognized shape
    /// (not a JSON object, array or integer).
    #[error("Strapi returned an unknown response for '{endpoint}': {reason}")]
    UnknownError {
        /// Endpoint that was requested, relative to the base URL.
        endpoint: String,
        /// Short description of what was wrong with the body.
        reason: String,
    },

    /// HTTP transport failed before a response was received.
    ///
    /// ## Recoverability
    ///
    /// Connection and timeout errors are typically recoverable.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Transport failure reported by a non-reqwest transport.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O operation failed (file-backed cache store, config files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache store could not complete an operation.
    #[error("Cache error: {0}")]
    Cache(String),

    /// The background job queue rejected a job.
    #[error("Queue error: {0}")]
    Queue(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// ## Common Causes
    ///
    /// - `STRAPI_URL` is not set
    /// - Unknown `cache_type`
    /// - A flexible cache window whose fresh period is not shorter than its
    ///   total period
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// CMS 5xx responses, network timeouts and connection failures are
    /// considered transient. A 404 or a 401/403 will not change on retry.
    ///
    /// ```rust
    /// use strapi_cache_core::Error;
    ///
    /// let busy = Error::PermissionDenied { status: 503, endpoint: "articles".into() };
    /// let forbidden = Error::PermissionDenied { status: 403, endpoint: "articles".into() };
    ///
    /// assert!(busy.is_recoverable());
    /// assert!(!forbidden.is_recoverable());
    /// ```
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::PermissionDenied { status, .. } => *status >= 500 || *status == 429,
            Self::Transport(_) | Self::Queue(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier.
    ///
    /// Useful as a structured logging field:
    ///
    /// - `"not_found"`, `"permission_denied"`, `"unknown"` - CMS responses
    /// - `"network"` - HTTP transport
    /// - `"io"`, `"cache"`, `"queue"` - collaborators
    /// - `"config"`, `"serialization"` - setup and data conversion
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::PermissionDenied { .. } => "permission_denied",
            Self::UnknownError { .. } => "unknown",
            Self::Network(_) | Self::Transport(_) => "network",
            Self::Io(_) => "io",
            Self::Cache(_) => "cache",
            Self::Queue(_) => "queue",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
        }
    }

    /// HTTP status carried by the error, if the CMS produced one.
    ///
    /// [`Error::NotFound`] covers both a 404 and a successful response with
    /// a `null` body, so it reports no status.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::PermissionDenied { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
