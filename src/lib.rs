//! # spider-dispatch
//!
//! A host-routed crawling engine.
//!
//! Seed URLs enter a deduplicating frontier. A pool of workers fetches each
//! URL and hands the response to the spider registered for the URL's host.
//! Spiders push records onto one item stream, and a single consumer runs
//! every record through an ordered pipeline chain before it reaches a sink.
//! When the frontier drains, or a stop is requested, the engine halts in two
//! phases so that no record already produced is lost.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_dispatch::prelude::*;
//!
//! #[derive(Debug, serde::Serialize)]
//! struct Title(String);
//!
//! struct TitleSpider;
//!
//! #[async_trait]
//! impl Spider for TitleSpider {
//!     type Item = Title;
//!
//!     async fn parse(
//!         &self,
//!         response: Response,
//!         output: &ItemEmitter<Title>,
//!     ) -> Result<(), SpiderError> {
//!         output.emit(Title(response.text())).await
//!     }
//! }
//!
//! async fn run_crawler() -> Result<(), SpiderError> {
//!     let crawler = CrawlerBuilder::new()
//!         .add_spider("example.com", TitleSpider)
//!         .start_urls(["https://example.com/"])
//!         .build()?;
//!     let summary = crawler.start_crawl().await?;
//!     println!("{summary}");
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod pipeline;
pub mod pipelines;
pub mod prelude;
pub mod registry;
pub mod request;
pub mod response;
pub mod scheduler;
pub mod shutdown;
pub mod spider;
pub mod state;
pub mod stats;

pub use builder::{CrawlerBuilder, CrawlerConfig};
pub use crawler::Crawler;
pub use downloader::{Downloader, ReqwestClientDownloader};
pub use error::{FetchError, PipelineError, SpiderError};
pub use pipeline::{Next, Pipeline, PipelineChain};
pub use registry::SpiderRegistry;
pub use request::Request;
pub use response::Response;
pub use scheduler::{JobState, Scheduler};
pub use shutdown::StopHandle;
pub use spider::{ItemEmitter, ScrapedItem, Spider};
pub use stats::{CrawlSummary, StatCollector};

pub use async_trait::async_trait;
pub use tokio;
