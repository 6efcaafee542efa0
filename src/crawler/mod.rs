//! # Crawler Module
//!
//! Implements the engine that runs a crawl end to end.
//!
//! ## Overview
//!
//! The crawler wires the frontier, the workers, the spider registry and the
//! pipeline chain together and owns the shutdown protocol.
//!
//! ## Key Components
//!
//! - **Crawler**: The orchestrator and shutdown coordinator
//! - **Downloader Task**: A pool of workers, each running fetch + spider jobs
//! - **Response Parser**: Routes a response to the spider registered for its host
//! - **Item Processor**: The single consumer that runs every record through the chain
//!
//! ## Architecture
//!
//! ```text
//! seeds -> Scheduler -> workers (fetch -> dispatch -> spider) -> item stream -> item processor -> chain -> sink
//! ```
//!
//! Workers run in parallel Tokio tasks; the item stream is a `kanal` channel
//! with many producers and exactly one consumer.

mod core;
mod item_processor;
mod request_handler;
mod response_parser;

pub use core::Crawler;
pub(crate) use item_processor::spawn_item_processor_task;
pub(crate) use request_handler::{WorkerConfig, spawn_downloader_task};
pub use response_parser::{DispatchOutcome, dispatch_response};
