//! HTTP access to the Strapi REST API.
//!
//! [`Transport`] is the seam to the network: one request in, status and body
//! out. [`ReqwestTransport`] is the production implementation. [`ApiFetcher`]
//! sits on top of a transport, adds authentication and query serialization,
//! and classifies each response into a [`FetchOutcome`].

use crate::{Error, QueryParams, ResponseTransformer, Result, UrlRewriteMode};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP methods the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Read content.
    Get,
    /// Create an entry.
    Post,
    /// Update an entry.
    Put,
}

impl HttpMethod {
    /// Uppercase method name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
        }
    }
}

/// A fully resolved request handed to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method to use.
    pub method: HttpMethod,
    /// Absolute URL without query string.
    pub url: String,
    /// Extra headers.
    pub headers: Vec<(String, String)>,
    /// Flattened query parameters.
    pub query: Vec<(String, String)>,
    /// JSON body for POST/PUT.
    pub body: Option<Value>,
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body text.
    pub body: String,
}

impl HttpResponse {
    /// Response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends requests to the CMS.
///
/// Implementations report transport-level failures (DNS, TLS, timeouts) as
/// errors; any HTTP status, including 4xx/5xx, is a successful response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Transport with a 30 second request timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Transport with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("strapi-cache/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
        };

        let mut builder = self.client.request(method, &request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse { status, body })
    }
}

/// Classification of a CMS response.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Usable payload (object, array or integer).
    Success(Value),
    /// 404, or a `null` body.
    NotFound,
    /// Any other status of 400 or above.
    PermissionDenied(u16),
    /// Successful status with an unrecognized body.
    Malformed(String),
}

impl FetchOutcome {
    /// Classify a raw response.
    ///
    /// Rules apply in order: 404, other statuses ≥ 400, `null` (or empty)
    /// body, body shape.
    #[must_use]
    pub fn classify(response: &HttpResponse) -> Self {
        if response.status == 404 {
            return Self::NotFound;
        }
        if response.status >= 400 {
            return Self::PermissionDenied(response.status);
        }
        if response.body.trim().is_empty() {
            return Self::NotFound;
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Null) => Self::NotFound,
            Ok(value @ (Value::Object(_) | Value::Array(_))) => Self::Success(value),
            Ok(Value::Number(n)) if n.is_i64() || n.is_u64() => Self::Success(Value::Number(n)),
            Ok(other) => Self::Malformed(format!("unexpected {} body", json_kind(&other))),
            Err(e) => Self::Malformed(format!("invalid JSON: {e}")),
        }
    }

    /// Convert into the payload or the matching error.
    pub fn into_result(self, endpoint: &str) -> Result<Value> {
        match self {
            Self::Success(value) => Ok(value),
            Self::NotFound => Err(Error::NotFound {
                endpoint: endpoint.to_string(),
            }),
            Self::PermissionDenied(status) => Err(Error::PermissionDenied {
                status,
                endpoint: endpoint.to_string(),
            }),
            Self::Malformed(reason) => Err(Error::UnknownError {
                endpoint: endpoint.to_string(),
                reason,
            }),
        }
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "non-integer number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// What to do when a fetch does not yield a usable payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return the failure to the caller as an [`Error`].
    Raise,
    /// Log a warning and yield nothing.
    Log,
}

/// Performs requests against one CMS and classifies the responses.
#[derive(Clone)]
pub struct ApiFetcher {
    transport: Arc<dyn Transport>,
    base_url: String,
    token: String,
    transformer: ResponseTransformer,
    debug: bool,
}

impl std::fmt::Debug for ApiFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiFetcher")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("rewrite_mode", &self.transformer.mode())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl ApiFetcher {
    /// Fetcher for `base_url`. An empty token sends no `Authorization` header.
    pub fn new(
        transport: Arc<dyn Transport>,
        base_url: impl Into<String>,
        token: impl Into<String>,
        rewrite_mode: UrlRewriteMode,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let transformer = ResponseTransformer::new(base_url.clone(), rewrite_mode);
        Self {
            transport,
            base_url,
            token: token.into(),
            transformer,
            debug: false,
        }
    }

    /// Log every request and response status at `info` level.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bearer token sent with requests.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Rewrite mode applied when full URLs are requested.
    #[must_use]
    pub const fn rewrite_mode(&self) -> UrlRewriteMode {
        self.transformer.mode()
    }

    /// Whether request logging is on.
    #[must_use]
    pub const fn debug(&self) -> bool {
        self.debug
    }

    /// GET `endpoint` and classify the response.
    ///
    /// Successful payloads are passed through the [`ResponseTransformer`]
    /// when `full_urls` is set. Transport failures are returned as errors.
    pub async fn fetch(
        &self,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
    ) -> Result<FetchOutcome> {
        let request = self.request(HttpMethod::Get, endpoint, params.to_pairs(), None);
        let outcome = self.execute(request).await?;

        Ok(match outcome {
            FetchOutcome::Success(value) if full_urls => {
                FetchOutcome::Success(self.transformer.transform_owned(value))
            },
            other => other,
        })
    }

    /// GET `endpoint` and resolve failures according to `mode`.
    ///
    /// With [`FailureMode::Log`] every failure, including transport errors, is
    /// logged and reported as `Ok(None)`.
    pub async fn fetch_with(
        &self,
        endpoint: &str,
        params: &QueryParams,
        full_urls: bool,
        mode: FailureMode,
    ) -> Result<Option<Value>> {
        let result = match self.fetch(endpoint, params, full_urls).await {
            Ok(outcome) => outcome.into_result(endpoint),
            Err(e) => Err(e),
        };

        match (result, mode) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), FailureMode::Raise) => Err(e),
            (Err(e), FailureMode::Log) => {
                warn!(
                    endpoint,
                    category = e.category(),
                    status = e.status(),
                    "Strapi API request failed: {}",
                    e
                );
                Ok(None)
            },
        }
    }

    /// POST or PUT `data` to `endpoint`, wrapped as `{"data": ...}`.
    pub async fn send_json(&self, method: HttpMethod, endpoint: &str, data: Value) -> Result<Value> {
        let request = self.request(method, endpoint, Vec::new(), Some(json!({ "data": data })));
        self.execute(request).await?.into_result(endpoint)
    }

    fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        query: Vec<(String, String)>,
        body: Option<Value>,
    ) -> HttpRequest {
        let mut headers = vec![(ACCEPT.as_str().to_string(), "application/json".to_string())];
        if !self.token.is_empty() {
            headers.push((
                AUTHORIZATION.as_str().to_string(),
                format!("Bearer {}", self.token),
            ));
        }

        HttpRequest {
            method,
            url: self.url_for(endpoint),
            headers,
            query,
            body,
        }
    }

    async fn execute(&self, request: HttpRequest) -> Result<FetchOutcome> {
        if self.debug {
            info!(
                method = request.method.as_str(),
                url = %request.url,
                query = ?request.query,
                "Strapi request"
            );
        }

        let response = self.transport.send(request).await?;
        let outcome = FetchOutcome::classify(&response);

        if self.debug {
            info!(status = response.status, bytes = response.body.len(), "Strapi response");
        }
        if let FetchOutcome::PermissionDenied(status) = outcome {
            debug!(status, body = %response.body, "Strapi rejected request");
        }
        Ok(outcome)
    }

    fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }
}
