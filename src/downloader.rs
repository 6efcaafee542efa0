//! # Downloader Module
//!
//! The fetcher: one outbound GET per request, no retries.
//!
//! Retry policy belongs to the workers (see `CrawlerConfig::max_retries`);
//! a downloader only reports what happened. Non-2xx statuses are successful
//! fetches, it is up to the spider to decide what a 404 page means.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_dispatch::{Downloader, ReqwestClientDownloader, Request};
//!
//! let downloader = ReqwestClientDownloader::new()?.with_compression(true)?;
//! let response = downloader.download(Request::parse("https://example.com")?).await?;
//! println!("{} bytes", response.body.len());
//! ```

use crate::error::{FetchError, SpiderError};
use crate::request::Request;
use crate::response::Response;
use async_trait::async_trait;
use tracing::trace;

/// Performs a single retrieval of a request.
#[async_trait]
pub trait Downloader: Send + Sync + 'static {
    async fn download(&self, request: Request) -> Result<Response, FetchError>;
}

/// A [`Downloader`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClientDownloader {
    client: reqwest::Client,
    compression: bool,
}

impl ReqwestClientDownloader {
    /// Creates a downloader with compression negotiation disabled.
    pub fn new() -> Result<Self, SpiderError> {
        Ok(Self {
            client: build_client(false)?,
            compression: false,
        })
    }

    /// Wraps a preconfigured client, e.g. one with a custom user agent or
    /// proxy. `compressed` must state whether that client decodes
    /// gzip/brotli/deflate bodies.
    pub fn from_client(client: reqwest::Client, compressed: bool) -> Self {
        Self {
            client,
            compression: compressed,
        }
    }

    /// Toggles `Accept-Encoding` negotiation with transparent decoding of
    /// gzip, brotli and deflate bodies. Rebuilds the client when the
    /// setting changes.
    pub fn with_compression(mut self, enabled: bool) -> Result<Self, SpiderError> {
        if self.compression != enabled {
            self.client = build_client(enabled)?;
            self.compression = enabled;
        }
        Ok(self)
    }

    /// Whether the client negotiates and decodes compressed bodies.
    pub fn compression(&self) -> bool {
        self.compression
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

// The gzip/brotli/deflate cargo features turn decoding on by default, so the
// flags are always set explicitly.
fn build_client(compression: bool) -> Result<reqwest::Client, SpiderError> {
    reqwest::Client::builder()
        .gzip(compression)
        .brotli(compression)
        .deflate(compression)
        .build()
        .map_err(|e| SpiderError::ConfigurationError(format!("failed to build HTTP client: {e}")))
}

#[async_trait]
impl Downloader for ReqwestClientDownloader {
    async fn download(&self, request: Request) -> Result<Response, FetchError> {
        let request_url = request.url;
        trace!("GET {}", request_url);

        let res = self
            .client
            .get(request_url.clone())
            .send()
            .await
            .map_err(|source| FetchError::Network {
                url: request_url.to_string(),
                source,
            })?;

        let url = res.url().clone();
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await.map_err(|source| FetchError::Body {
            url: request_url.to_string(),
            source,
        })?;

        trace!("{} -> {} ({} bytes)", request_url, status, body.len());
        Ok(Response {
            url,
            request_url,
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn compression_toggle_is_tracked() {
        let d = ReqwestClientDownloader::new().unwrap();
        assert!(!d.compression());
        let d = d.with_compression(true).unwrap();
        assert!(d.compression());
        let d = d.with_compression(false).unwrap();
        assert!(!d.compression());
    }

    #[tokio::test]
    async fn preconfigured_client_is_used_as_is() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("user-agent", "dmoz-bot/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let client = reqwest::Client::builder()
            .user_agent("dmoz-bot/1.0")
            .gzip(false)
            .brotli(false)
            .deflate(false)
            .build()
            .unwrap();
        let downloader = ReqwestClientDownloader::from_client(client, false);
        assert!(!downloader.compression());

        let response = downloader
            .download(Request::parse(&format!("{}/page", server.uri())).unwrap())
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(response.text(), "ok");
    }

    #[tokio::test]
    async fn error_statuses_are_successful_fetches() {
        let server = MockServer::start().await;
        let downloader = ReqwestClientDownloader::new().unwrap();

        let response = downloader
            .download(Request::parse(&format!("{}/missing", server.uri())).unwrap())
            .await
            .unwrap();
        assert!(!response.is_success());
        assert_eq!(response.status.as_u16(), 404);
    }
}
