//! # Builder Module
//!
//! Provides the `CrawlerBuilder`, a fluent API for assembling a `Crawler`
//! from spiders, pipeline stages, a downloader and settings.
//!
//! ## Overview
//!
//! Everything the crawl needs is fixed here, before it starts: the spider
//! registry becomes read-only and the pipeline chain's order is final.
//! Settings live in [`CrawlerConfig`], which can also be deserialized from a
//! configuration file.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spider_dispatch::prelude::*;
//!
//! let crawler = CrawlerBuilder::new()
//!     .use_compression()
//!     .add_spider("dmoztools.net", DmozSpider)
//!     .add_pipeline(MapPipeline::new("trim", trim_listing))
//!     .add_pipeline(JsonLinesWriterPipeline::stdout())
//!     .start_urls(["http://dmoztools.net/Computers/Programming/Languages/Python/Books/"])
//!     .build()?;
//!
//! let summary = crawler.start_crawl().await?;
//! ```

use crate::downloader::{Downloader, ReqwestClientDownloader};
use crate::error::SpiderError;
use crate::pipeline::{Pipeline, PipelineChain};
use crate::pipelines::ConsoleWriterPipeline;
use crate::registry::SpiderRegistry;
use crate::scheduler::Scheduler;
use crate::spider::{ScrapedItem, Spider};
use crate::state::CrawlerState;
use crate::stats::StatCollector;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::crawler::Crawler;

/// Settings of one crawl.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of workers running fetch + spider jobs in parallel.
    pub max_concurrent_downloads: usize,
    /// Capacity of the item stream. `None` means unbounded; with a bound,
    /// a spider emitting into a full stream waits for the pipeline.
    pub item_channel_capacity: Option<usize>,
    /// Negotiate compressed responses with the default downloader.
    pub compression: bool,
    /// Additional fetch attempts after a failure. `0` disables retries.
    pub max_retries: u32,
    /// Delay before the first retry, doubled on every further attempt.
    pub retry_backoff: Duration,
    /// Upper bound on the drain after a stop. `None` waits for every
    /// in-flight job.
    pub drain_timeout: Option<Duration>,
    /// Abort fetches still on the wire when a stop is requested.
    pub abort_in_flight_on_stop: bool,
    /// Refuse a second spider for an already registered host.
    pub strict_registration: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        CrawlerConfig {
            max_concurrent_downloads: num_cpus::get().max(4),
            item_channel_capacity: None,
            compression: false,
            max_retries: 0,
            retry_backoff: Duration::from_millis(500),
            drain_timeout: None,
            abort_in_flight_on_stop: false,
            strict_registration: false,
        }
    }
}

impl CrawlerConfig {
    /// Loads settings from a JSON document; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SpiderError> {
        Ok(serde_json::from_str(json)?)
    }

    fn validate(&self) -> Result<(), SpiderError> {
        if self.max_concurrent_downloads == 0 {
            return Err(SpiderError::ConfigurationError(
                "max_concurrent_downloads must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }
}

pub struct CrawlerBuilder<I: ScrapedItem, D: Downloader = ReqwestClientDownloader> {
    crawler_config: CrawlerConfig,
    downloader: Result<D, SpiderError>,
    registry: SpiderRegistry<I>,
    registration_error: Option<SpiderError>,
    item_pipelines: Vec<Box<dyn Pipeline<I>>>,
    start_urls: Vec<String>,
    stop_on_ctrl_c: bool,
}

impl<I: ScrapedItem> Default for CrawlerBuilder<I, ReqwestClientDownloader> {
    fn default() -> Self {
        Self::with_config(CrawlerConfig::default())
    }
}

impl<I: ScrapedItem> CrawlerBuilder<I, ReqwestClientDownloader> {
    /// Creates a builder with default settings and the reqwest downloader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder from loaded settings.
    pub fn with_config(config: CrawlerConfig) -> Self {
        Self {
            downloader: ReqwestClientDownloader::new()
                .and_then(|d| d.with_compression(config.compression)),
            crawler_config: config,
            registry: SpiderRegistry::new(),
            registration_error: None,
            item_pipelines: Vec::new(),
            start_urls: Vec::new(),
            stop_on_ctrl_c: true,
        }
    }

    /// Enables response compression negotiation.
    pub fn use_compression(self) -> Self {
        self.compression(true)
    }

    pub fn compression(mut self, enabled: bool) -> Self {
        self.crawler_config.compression = enabled;
        self.downloader = self.downloader.and_then(|d| d.with_compression(enabled));
        self
    }
}

impl<I: ScrapedItem, D: Downloader> CrawlerBuilder<I, D> {
    /// Sets the number of concurrent fetch + spider workers.
    pub fn max_concurrent_downloads(mut self, limit: usize) -> Self {
        self.crawler_config.max_concurrent_downloads = limit;
        self
    }

    /// Bounds the item stream; `None` keeps it unbounded.
    pub fn item_channel_capacity(mut self, capacity: Option<usize>) -> Self {
        self.crawler_config.item_channel_capacity = capacity;
        self
    }

    /// Sets the retry policy for failed fetches.
    pub fn retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.crawler_config.max_retries = max_retries;
        self.crawler_config.retry_backoff = backoff;
        self
    }

    /// Bounds how long the drain may take after a stop.
    pub fn drain_timeout(mut self, timeout: Duration) -> Self {
        self.crawler_config.drain_timeout = Some(timeout);
        self
    }

    /// Aborts fetches still on the wire when a stop is requested.
    pub fn abort_in_flight_on_stop(mut self, enabled: bool) -> Self {
        self.crawler_config.abort_in_flight_on_stop = enabled;
        self
    }

    /// Makes later `add_spider` calls fail the build on a duplicate host
    /// instead of replacing the earlier spider.
    pub fn strict_registration(mut self, enabled: bool) -> Self {
        self.crawler_config.strict_registration = enabled;
        self
    }

    /// Whether Ctrl-C stops the crawl. On by default.
    pub fn stop_on_ctrl_c(mut self, enabled: bool) -> Self {
        self.stop_on_ctrl_c = enabled;
        self
    }

    /// Sets a custom downloader for the crawler.
    pub fn downloader<D2: Downloader>(self, downloader: D2) -> CrawlerBuilder<I, D2> {
        CrawlerBuilder {
            crawler_config: self.crawler_config,
            downloader: Ok(downloader),
            registry: self.registry,
            registration_error: self.registration_error,
            item_pipelines: self.item_pipelines,
            start_urls: self.start_urls,
            stop_on_ctrl_c: self.stop_on_ctrl_c,
        }
    }

    /// Registers `spider` for `host`.
    ///
    /// A later registration for the same host replaces the earlier one,
    /// unless strict registration is on, in which case `build` fails with
    /// `RegistrationConflict`.
    pub fn add_spider<S>(mut self, host: &str, spider: S) -> Self
    where
        S: Spider<Item = I>,
    {
        if self.crawler_config.strict_registration {
            if let Err(e) = self.registry.try_register(host, spider) {
                self.registration_error.get_or_insert(e);
            }
        } else {
            self.registry.register(host, spider);
        }
        self
    }

    /// Registers `spider` for `host`, failing immediately on a duplicate.
    pub fn try_add_spider<S>(mut self, host: &str, spider: S) -> Result<Self, SpiderError>
    where
        S: Spider<Item = I>,
    {
        self.registry.try_register(host, spider)?;
        Ok(self)
    }

    /// Appends a stage to the pipeline chain.
    pub fn add_pipeline<P>(mut self, pipeline: P) -> Self
    where
        P: Pipeline<I>,
    {
        self.item_pipelines.push(Box::new(pipeline));
        self
    }

    /// Adds seed URLs, in order.
    pub fn start_urls<U>(mut self, urls: impl IntoIterator<Item = U>) -> Self
    where
        U: Into<String>,
    {
        self.start_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.crawler_config
    }

    /// Builds the `Crawler`.
    pub fn build(mut self) -> Result<Crawler<I>, SpiderError> {
        self.crawler_config.validate()?;
        if let Some(e) = self.registration_error.take() {
            return Err(e);
        }

        // Add a default ConsoleWriter pipeline if none are provided
        if self.item_pipelines.is_empty() {
            self = self.add_pipeline(ConsoleWriterPipeline::new());
        }
        let downloader = self.downloader?;

        let mut seeds = self.start_urls;
        for spider in self.registry.spiders() {
            seeds.extend(spider.start_urls().into_iter().map(String::from));
        }
        debug!(
            "Building crawler for hosts {:?} with {} seeds",
            self.registry.hosts().collect::<Vec<_>>(),
            seeds.len()
        );

        let state = CrawlerState::new();
        let (scheduler, req_rx) = Scheduler::new(Arc::clone(&state));
        Ok(Crawler::new(
            scheduler,
            req_rx,
            state,
            Arc::new(downloader),
            Arc::new(self.registry),
            PipelineChain::new(self.item_pipelines),
            seeds,
            self.crawler_config,
            self.stop_on_ctrl_c,
            Arc::new(StatCollector::new()),
        ))
    }
}
