//! A "prelude" for users of the `spider-dispatch` crate.
//!
//! This prelude re-exports the most commonly used traits and structs
//! so that they can be easily imported.
//!
//! # Example
//!
//! ```
//! use spider_dispatch::prelude::*;
//! ```

pub use crate::{
    // Core structs
    Crawler,
    CrawlerBuilder,
    CrawlerConfig,
    ItemEmitter,
    Next,
    Request,
    Response,
    StopHandle,
    // Core traits
    Downloader,
    Pipeline,
    ScrapedItem,
    Spider,
    // Errors
    FetchError,
    PipelineError,
    SpiderError,
    // Essential re-exports for trait implementation
    async_trait,
};

pub use crate::pipelines::{
    ConsoleWriterPipeline, FilterPipeline, JsonLinesWriterPipeline, MapPipeline,
};
