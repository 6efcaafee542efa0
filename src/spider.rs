//! # Spider Module
//!
//! Defines the `Spider` trait and the `ItemEmitter` a spider writes to.
//!
//! ## Overview
//!
//! A spider is scoped to one hostname. For every fetched page of that host the
//! crawler calls [`Spider::parse`] with the response and an [`ItemEmitter`].
//! The spider pushes zero or more records with [`ItemEmitter::emit`]; records
//! from one `parse` call reach the pipeline in the order they were emitted.
//! Links worth following can be handed back to the frontier with
//! [`ItemEmitter::follow`].
//!
//! An `Err` from `parse` only fails that one page. Records already emitted
//! stay on the stream.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_dispatch::prelude::*;
//!
//! #[derive(Debug, serde::Serialize)]
//! struct Title {
//!     title: String,
//! }
//!
//! struct TitleSpider;
//!
//! #[async_trait]
//! impl Spider for TitleSpider {
//!     type Item = Title;
//!
//!     async fn parse(&self, response: Response, output: &ItemEmitter<Title>) -> Result<(), SpiderError> {
//!         let title = response.text();
//!         output.emit(Title { title }).await
//!     }
//! }
//! ```

use crate::error::SpiderError;
use crate::request::Request;
use crate::response::Response;
use crate::scheduler::Scheduler;
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use async_trait::async_trait;
use kanal::{AsyncReceiver, AsyncSender};
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::trace;
use url::Url;

/// A record produced by a spider.
///
/// Implemented for every `Serialize + Debug` type that can cross threads.
pub trait ScrapedItem: serde::Serialize + Debug + Send + Sync + 'static {}

impl<T> ScrapedItem for T where T: serde::Serialize + Debug + Send + Sync + 'static {}

/// Defines the contract for a site-specific extraction handler.
#[async_trait]
pub trait Spider: Send + Sync + 'static {
    /// The type of item that the spider scrapes.
    type Item: ScrapedItem;

    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Seed URLs contributed by this spider in addition to the crawler's own.
    fn start_urls(&self) -> Vec<&'static str> {
        Vec::new()
    }

    /// Extracts records from one response and pushes them onto `output`.
    async fn parse(
        &self,
        response: Response,
        output: &ItemEmitter<Self::Item>,
    ) -> Result<(), SpiderError>;
}

/// Producer handle to the item stream, handed to one `parse` call.
pub struct ItemEmitter<I> {
    item_tx: AsyncSender<I>,
    scheduler: Arc<Scheduler>,
    state: Arc<CrawlerState>,
    stats: Arc<StatCollector>,
    emitted: AtomicUsize,
}

impl<I: ScrapedItem> ItemEmitter<I> {
    pub(crate) fn new(
        item_tx: AsyncSender<I>,
        scheduler: Arc<Scheduler>,
        state: Arc<CrawlerState>,
        stats: Arc<StatCollector>,
    ) -> Self {
        ItemEmitter {
            item_tx,
            scheduler,
            state,
            stats,
            emitted: AtomicUsize::new(0),
        }
    }

    /// Creates an emitter that is not attached to a crawl, with the receiving
    /// end of its stream. Useful to exercise a spider in isolation; `follow`
    /// on such an emitter never enqueues anything.
    pub fn standalone() -> (Self, AsyncReceiver<I>) {
        let (item_tx, item_rx) = kanal::unbounded_async();
        let state = CrawlerState::new();
        let (scheduler, _) = Scheduler::new(Arc::clone(&state));
        let emitter = Self::new(item_tx, scheduler, state, Arc::new(StatCollector::new()));
        (emitter, item_rx)
    }

    /// Pushes one record onto the item stream.
    ///
    /// Suspends while a bounded stream is full. Pushing to a closed stream
    /// means the engine shut down in the wrong order; the violation is
    /// recorded on the crawl and `SpiderError::StreamClosed` is returned.
    pub async fn emit(&self, item: I) -> Result<(), SpiderError> {
        if self.item_tx.send(item).await.is_err() {
            self.state.record_violation(SpiderError::StreamClosed);
            return Err(SpiderError::StreamClosed);
        }
        self.emitted.fetch_add(1, Ordering::SeqCst);
        self.stats.increment_items_scraped();
        Ok(())
    }

    /// Hands a discovered URL to the frontier.
    ///
    /// Returns `Ok(false)` when the URL was already known or the crawl has
    /// stopped accepting work.
    pub async fn follow(&self, url: Url) -> Result<bool, SpiderError> {
        trace!("Following discovered URL: {}", url);
        let accepted = self.scheduler.enqueue_request(Request::new(url)).await?;
        if accepted {
            self.stats.increment_jobs_enqueued();
        }
        Ok(accepted)
    }

    /// Number of records pushed through this handle.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, serde::Serialize, PartialEq)]
    struct Row(u32);

    #[tokio::test]
    async fn emit_preserves_order() {
        let (emitter, rx) = ItemEmitter::standalone();
        for i in 0..5 {
            emitter.emit(Row(i)).await.unwrap();
        }
        assert_eq!(emitter.emitted(), 5);
        for i in 0..5 {
            assert_eq!(rx.recv().await.unwrap(), Row(i));
        }
    }

    #[tokio::test]
    async fn emit_to_closed_stream_is_a_violation() {
        let (emitter, rx) = ItemEmitter::<Row>::standalone();
        drop(rx);
        let err = emitter.emit(Row(1)).await.unwrap_err();
        assert!(matches!(err, SpiderError::StreamClosed));
        assert!(emitter.state.is_stopping());
        assert!(emitter.state.take_violation().is_some());
    }

    #[tokio::test]
    async fn standalone_follow_is_refused() {
        let (emitter, _rx) = ItemEmitter::<Row>::standalone();
        let accepted = emitter
            .follow(Url::parse("http://example.test/next").unwrap())
            .await
            .unwrap();
        assert!(!accepted);
    }
}
