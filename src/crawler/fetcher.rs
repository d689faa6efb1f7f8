//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured header and cookie profile
//! - GET requests for list pages, one attempt per call
//! - Error classification into transport failures and suspected blocks
//!
//! Retrying is the controller's job; nothing here sleeps or loops.

use crate::config::RequestConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, COOKIE};
use reqwest::{Client, StatusCode};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Headers the HTTP client manages itself and must not be overridden
const CLIENT_MANAGED_HEADERS: &[&str] = &["host", "accept-encoding", "content-length"];

/// Body of a successfully fetched page
#[derive(Debug, Clone)]
pub struct RawPage {
    /// URL that was requested
    pub url: Url,

    /// HTTP status code
    pub status: u16,

    /// Decoded response body
    pub body: String,

    /// Character set declared by the response (`utf-8` if none)
    pub encoding: String,
}

/// Why a response was treated as a block page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Body shorter than any real list page
    Undersized { bytes: usize, threshold: usize },

    /// Server answered 403 or 429
    Refused { status: u16 },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undersized { bytes, threshold } => write!(
                f,
                "response of {} bytes is below the {}-byte minimum",
                bytes, threshold
            ),
            Self::Refused { status } => write!(f, "server refused the request with HTTP {}", status),
        }
    }
}

/// A single failed fetch attempt
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Connectivity, timeout, or unexpected HTTP status
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The response looks like an anti-scraping interception
    #[error("suspected block: {reason}")]
    SuspectedBlock { reason: BlockReason },
}

impl FetchError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn is_suspected_block(&self) -> bool {
        matches!(self, Self::SuspectedBlock { .. })
    }
}

/// Performs exactly one fetch attempt per call
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError>;
}

/// Builds an HTTP client with the configured request profile
///
/// # Arguments
///
/// * `config` - The request configuration (user agent, cookie, headers, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use tousu_crawler::config::RequestConfig;
/// use tousu_crawler::crawler::build_http_client;
///
/// let client = build_http_client(&RequestConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &RequestConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(default_headers(config))
        .timeout(config.timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Converts the configured header table and cookie into a header map
///
/// Invalid entries are rejected by config validation; anything that still
/// fails to convert here is logged and dropped.
fn default_headers(config: &RequestConfig) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in &config.headers {
        if CLIENT_MANAGED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            tracing::debug!("Ignoring client-managed header '{}'", name);
            continue;
        }

        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!("Dropping invalid header '{}'", name),
        }
    }

    if !config.cookie.is_empty() {
        match HeaderValue::from_str(&config.cookie) {
            Ok(value) => {
                headers.insert(COOKIE, value);
            }
            Err(_) => tracing::warn!("Dropping invalid cookie value"),
        }
    }

    headers
}

/// Extracts the `charset` parameter from a Content-Type header value
///
/// # Examples
///
/// ```
/// use tousu_crawler::crawler::charset_from_content_type;
///
/// assert_eq!(
///     charset_from_content_type("text/html; charset=GBK"),
///     Some("gbk".to_string())
/// );
/// assert_eq!(charset_from_content_type("text/html"), None);
/// ```
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("charset"))
        .map(|(_, value)| value.trim().trim_matches('"').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
}

/// Classifies a decoded body against the minimum-size heuristic
pub fn check_body_size(body: &str, min_valid_bytes: usize) -> Result<(), FetchError> {
    if body.len() < min_valid_bytes {
        return Err(FetchError::SuspectedBlock {
            reason: BlockReason::Undersized {
                bytes: body.len(),
                threshold: min_valid_bytes,
            },
        });
    }
    Ok(())
}

/// `PageFetcher` backed by a reqwest client
pub struct HttpFetcher {
    client: Client,
    min_valid_bytes: usize,
}

impl HttpFetcher {
    pub fn new(client: Client, min_valid_bytes: usize) -> Self {
        Self {
            client,
            min_valid_bytes,
        }
    }

    /// Builds the client from configuration
    pub fn from_config(
        request: &RequestConfig,
        min_valid_bytes: usize,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(request)?, min_valid_bytes))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a page with a single GET request
    ///
    /// # Classification
    ///
    /// | Condition | Result |
    /// |-----------|--------|
    /// | Timeout, connection refused, DNS failure | Transport |
    /// | HTTP 403 / 429 | SuspectedBlock (Refused) |
    /// | Other non-2xx | Transport |
    /// | Body below `min_valid_bytes` | SuspectedBlock (Undersized) |
    /// | Otherwise | Success |
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError> {
        let response = match self.client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    format!("connection failed: {}", e)
                } else {
                    e.to_string()
                };
                return Err(FetchError::transport(message));
            }
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::SuspectedBlock {
                reason: BlockReason::Refused {
                    status: status.as_u16(),
                },
            });
        }

        if !status.is_success() {
            return Err(FetchError::transport(format!("HTTP {}", status.as_u16())));
        }

        let encoding = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type)
            .unwrap_or_else(|| "utf-8".to_string());

        // Decoded as UTF-8 whatever the declared charset
        let body = response
            .text_with_charset("utf-8")
            .await
            .map_err(|e| FetchError::transport(format!("failed to read body: {}", e)))?;

        check_body_size(&body, self.min_valid_bytes)?;

        Ok(RawPage {
            url: url.clone(),
            status: status.as_u16(),
            body,
            encoding,
        })
    }
}
