//! # Response Parser Module
//!
//! Routes a fetched response to the spider registered for its host.
//!
//! ## Overview
//!
//! Dispatch is a pure lookup on the lowercased host of the originating URL.
//! A response from a host nobody registered is dropped quietly: a crawl that
//! touches unregistered hosts simply produces no records for them.
//!
//! A spider failing on one page, by returning `Err` or by panicking, is
//! contained here. The failure is logged and counted and the job still
//! completes; records emitted before the failure stay on the stream.

use crate::registry::SpiderRegistry;
use crate::response::Response;
use crate::spider::{ItemEmitter, ScrapedItem};
use crate::stats::StatCollector;
use futures_util::FutureExt;
use log::{debug, error, trace};
use std::panic::AssertUnwindSafe;

/// What happened to one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A spider handled the response and emitted `items` records.
    Handled { items: usize },
    /// No spider is registered for the host.
    Unrouted,
    /// The spider failed after emitting `items` records.
    Failed { items: usize },
}

pub async fn dispatch_response<I: ScrapedItem>(
    registry: &SpiderRegistry<I>,
    response: Response,
    emitter: &ItemEmitter<I>,
    stats: &StatCollector,
) -> DispatchOutcome {
    let url = response.request_url.clone();
    let Some(spider) = response.host().and_then(|host| registry.get(&host)) else {
        debug!("No spider registered for {}, discarding response", url);
        stats.increment_responses_unrouted();
        return DispatchOutcome::Unrouted;
    };

    trace!("Dispatching {} to spider '{}'", url, spider.name());
    let result = AssertUnwindSafe(spider.parse(response, emitter))
        .catch_unwind()
        .await;

    let items = emitter.emitted();
    match result {
        Ok(Ok(())) => {
            debug!("Spider '{}' emitted {} items from {}", spider.name(), items, url);
            DispatchOutcome::Handled { items }
        }
        Ok(Err(e)) => {
            error!("Spider '{}' failed on {}: {}", spider.name(), url, e);
            stats.increment_spider_errors();
            DispatchOutcome::Failed { items }
        }
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Spider '{}' panicked on {}: {}", spider.name(), url, message);
            stats.increment_spider_errors();
            DispatchOutcome::Failed { items }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpiderError;
    use crate::spider::Spider;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use url::Url;

    struct Lines;

    #[async_trait]
    impl Spider for Lines {
        type Item = String;

        async fn parse(
            &self,
            response: Response,
            output: &ItemEmitter<String>,
        ) -> Result<(), SpiderError> {
            for line in response.text().lines() {
                if line == "bad" {
                    return Err(SpiderError::extraction("bad line"));
                }
                if line == "panic" {
                    panic!("spider bug");
                }
                output.emit(line.to_string()).await?;
            }
            Ok(())
        }
    }

    fn response(url: &str, body: &'static str) -> Response {
        Response::new(Url::parse(url).unwrap(), StatusCode::OK, body)
    }

    fn registry() -> SpiderRegistry<String> {
        let mut registry = SpiderRegistry::new();
        registry.register("example.test", Lines);
        registry
    }

    #[tokio::test]
    async fn routes_by_host_and_keeps_order() {
        let stats = StatCollector::new();
        let (emitter, rx) = ItemEmitter::standalone();

        let outcome =
            dispatch_response(&registry(), response("http://example.test/a", "1\n2\n3"), &emitter, &stats).await;

        assert_eq!(outcome, DispatchOutcome::Handled { items: 3 });
        for expected in ["1", "2", "3"] {
            assert_eq!(rx.recv().await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn unregistered_host_yields_nothing() {
        let stats = StatCollector::new();
        let (emitter, rx) = ItemEmitter::standalone();

        let outcome =
            dispatch_response(&registry(), response("http://other.test/a", "1"), &emitter, &stats).await;

        assert_eq!(outcome, DispatchOutcome::Unrouted);
        assert!(rx.is_empty());
        assert_eq!(stats.snapshot().responses_unrouted, 1);
        assert_eq!(stats.snapshot().spider_errors, 0);
    }

    #[tokio::test]
    async fn spider_error_is_contained() {
        let stats = StatCollector::new();
        let (emitter, rx) = ItemEmitter::standalone();

        let outcome =
            dispatch_response(&registry(), response("http://example.test/a", "1\nbad\n2"), &emitter, &stats).await;

        assert_eq!(outcome, DispatchOutcome::Failed { items: 1 });
        assert_eq!(rx.recv().await.unwrap(), "1");
        assert_eq!(stats.snapshot().spider_errors, 1);
    }

    #[tokio::test]
    async fn spider_panic_is_contained() {
        let stats = StatCollector::new();
        let (emitter, _rx) = ItemEmitter::standalone();

        let outcome =
            dispatch_response(&registry(), response("http://example.test/a", "panic"), &emitter, &stats).await;

        assert_eq!(outcome, DispatchOutcome::Failed { items: 0 });
        assert_eq!(stats.snapshot().spider_errors, 1);
    }
}
