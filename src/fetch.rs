//! Best-effort resource fetching.
//!
//! Every fetch resolves to a [`FetchOutcome`]: either the fetched resource or
//! the reason it was skipped. Nothing here returns an error for a single
//! resource; callers leave the reference untouched on `Skipped` and move on.

use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error as ThisError;
use url::Url;

/// Fallback MIME type for responses without a usable `Content-Type`
pub const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

/// How the response body should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Decode as text, honouring the response charset
    Text,
    /// Keep raw bytes
    Binary,
}

/// A response body read according to its [`BodyKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Text(String),
    Binary(Vec<u8>),
}

/// A successfully fetched resource.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub url: Url,
    /// Raw `Content-Type` header, if any
    pub content_type: Option<String>,
    pub body: Body,
}

impl FetchedResource {
    /// The `Content-Type` essence (parameters stripped), or
    /// [`FALLBACK_MIME_TYPE`] when missing or blank.
    pub fn mime_type(&self) -> String {
        self.content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|essence| !essence.is_empty())
            .unwrap_or(FALLBACK_MIME_TYPE)
            .to_string()
    }
}

/// Why a resource was not fetched.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("timed out after {0}ms")]
    Timeout(u64),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to read body: {0}")]
    Body(String),
}

/// Result of a single best-effort fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Fetched(FetchedResource),
    Skipped(SkipReason),
}

impl FetchOutcome {
    pub fn is_fetched(&self) -> bool {
        matches!(self, FetchOutcome::Fetched(_))
    }
}

/// HTTP session shared by the resource passes of one conversion.
///
/// Requests carry the capture's user agent and `Accept-Language` and are
/// bounded by a single timeout; there are no retries.
pub struct Fetcher {
    client: Client,
    timeout: Duration,
}

impl Fetcher {
    pub fn new(user_agent: &str, accept_language: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let language = HeaderValue::from_str(accept_language).map_err(|e| {
            Error::ConfigError(format!("invalid Accept-Language '{}': {}", accept_language, e))
        })?;
        headers.insert(ACCEPT_LANGUAGE, language);

        let client = Client::builder()
            .use_rustls_tls()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Fetch one resource.
    pub async fn fetch(&self, url: &Url, kind: BodyKind) -> FetchOutcome {
        match self.try_fetch(url, kind).await {
            Ok(resource) => {
                log::debug!("Fetched {}", url);
                FetchOutcome::Fetched(resource)
            }
            Err(reason) => FetchOutcome::Skipped(reason),
        }
    }

    /// Fetch many resources with at most `concurrency` requests in flight.
    ///
    /// Outcomes are returned in the order of `urls`, regardless of which
    /// request finished first.
    pub async fn fetch_all(&self, urls: &[Url], kind: BodyKind, concurrency: usize) -> Vec<FetchOutcome> {
        stream::iter(urls.iter().map(|url| self.fetch(url, kind)))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn try_fetch(&self, url: &Url, kind: BodyKind) -> std::result::Result<FetchedResource, SkipReason> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SkipReason::UnsupportedScheme(url.scheme().to_string()));
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SkipReason::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body = match kind {
            BodyKind::Text => Body::Text(response.text().await.map_err(|e| self.classify_body(e))?),
            BodyKind::Binary => Body::Binary(
                response
                    .bytes()
                    .await
                    .map_err(|e| self.classify_body(e))?
                    .to_vec(),
            ),
        };

        Ok(FetchedResource {
            url: url.clone(),
            content_type,
            body,
        })
    }

    fn classify(&self, err: reqwest::Error) -> SkipReason {
        if err.is_timeout() {
            SkipReason::Timeout(self.timeout.as_millis() as u64)
        } else {
            SkipReason::Network(err.to_string())
        }
    }

    fn classify_body(&self, err: reqwest::Error) -> SkipReason {
        if err.is_timeout() {
            SkipReason::Timeout(self.timeout.as_millis() as u64)
        } else {
            SkipReason::Body(err.to_string())
        }
    }
}
