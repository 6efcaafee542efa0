//! # Error Module
//!
//! Error taxonomy for the crawl engine.
//!
//! Failures fall in two groups. Per-job failures (`Fetch`, `Extraction`) are
//! contained: they are logged at the worker boundary and the job still counts
//! as done. Invariant violations (`StreamClosed`, `InvalidTransition`) surface
//! ordering bugs in the engine itself and are returned from
//! [`Crawler::start_crawl`](crate::Crawler::start_crawl).

use crate::scheduler::JobState;
use thiserror::Error;

/// Errors produced by the crawl engine.
#[derive(Debug, Error)]
pub enum SpiderError {
    /// Network or protocol failure while fetching a URL.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A spider failed to process one response.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Two spiders claimed the same hostname under strict registration.
    #[error("A spider is already registered for host '{host}'")]
    RegistrationConflict { host: String },

    /// A record was pushed after the item stream was closed.
    #[error("Item stream closed while a producer was still active")]
    StreamClosed,

    /// Invalid crawler settings.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// A job was moved through its lifecycle out of order.
    #[error("Invalid job transition for {url}: {from:?} -> {to:?}")]
    InvalidTransition {
        url: String,
        from: Option<JobState>,
        to: JobState,
    },

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    GeneralError(String),
}

impl SpiderError {
    /// Convenience constructor for spider implementations.
    pub fn extraction(message: impl Into<String>) -> Self {
        SpiderError::Extraction(message.into())
    }

    /// Returns true for errors that must abort the whole crawl.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            SpiderError::StreamClosed | SpiderError::InvalidTransition { .. }
        )
    }
}

/// Errors raised by a [`Downloader`](crate::Downloader).
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connection, TLS or protocol failure.
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response started but its body could not be read or decoded.
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The fetch was abandoned because the crawl was stopped.
    #[error("fetch of {url} aborted by shutdown")]
    Aborted { url: String },

    /// Used by custom downloaders that are not backed by reqwest.
    #[error("fetch of {url} failed: {message}")]
    Other { url: String, message: String },
}

impl FetchError {
    /// The URL the failed fetch was for.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Network { url, .. }
            | FetchError::Body { url, .. }
            | FetchError::Aborted { url }
            | FetchError::Other { url, .. } => url,
        }
    }
}

/// Errors raised by a pipeline stage.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Pipeline '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violations_are_flagged() {
        assert!(SpiderError::StreamClosed.is_invariant_violation());
        assert!(
            SpiderError::InvalidTransition {
                url: "http://a.test/".into(),
                from: Some(JobState::Done),
                to: JobState::Fetching,
            }
            .is_invariant_violation()
        );
        assert!(!SpiderError::extraction("bad html").is_invariant_violation());
        assert!(
            !SpiderError::RegistrationConflict {
                host: "a.test".into()
            }
            .is_invariant_violation()
        );
    }

    #[test]
    fn fetch_error_exposes_url() {
        let err = FetchError::Other {
            url: "http://a.test/x".into(),
            message: "boom".into(),
        };
        assert_eq!(err.url(), "http://a.test/x");
        let wrapped: SpiderError = err.into();
        assert!(wrapped.to_string().contains("boom"));
    }
}
