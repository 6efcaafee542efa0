//! The core Crawler implementation.
//!
//! This module defines the `Crawler` struct, the orchestrator of one crawl.
//! It ties together the scheduler, the downloader, the spider registry and the
//! item pipeline chain, and owns the shutdown sequence.
//!
//! A crawl ends in one of two ways: the frontier drains on its own (no live
//! jobs remain), or a stop is requested through a [`StopHandle`], Ctrl-C or an
//! invariant violation. Either way the halt runs in the same order:
//!
//! 1. intake closes, so no new job can be created,
//! 2. live jobs finish (queued ones are skipped),
//! 3. the request queue closes and the workers exit,
//! 4. the last item sender drops and the consumer drains the stream,
//! 5. the pipeline chain is closed.

use crate::Downloader;
use crate::builder::CrawlerConfig;
use crate::error::SpiderError;
use crate::pipeline::PipelineChain;
use crate::registry::SpiderRegistry;
use crate::request::Request;
use crate::scheduler::Scheduler;
use crate::shutdown::StopHandle;
use crate::spider::ScrapedItem;
use crate::state::CrawlerState;
use crate::stats::{CrawlSummary, StatCollector};
use kanal::{AsyncReceiver, bounded_async, unbounded_async};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

use super::{WorkerConfig, spawn_downloader_task, spawn_item_processor_task};

/// The central orchestrator of a crawl.
pub struct Crawler<I: ScrapedItem> {
    scheduler: Arc<Scheduler>,
    req_rx: AsyncReceiver<Request>,
    state: Arc<CrawlerState>,
    stats: Arc<StatCollector>,
    downloader: Arc<dyn Downloader>,
    registry: Arc<SpiderRegistry<I>>,
    pipelines: PipelineChain<I>,
    seeds: Vec<String>,
    config: CrawlerConfig,
    stop_on_ctrl_c: bool,
}

impl<I: ScrapedItem> Crawler<I> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        scheduler: Arc<Scheduler>,
        req_rx: AsyncReceiver<Request>,
        state: Arc<CrawlerState>,
        downloader: Arc<dyn Downloader>,
        registry: Arc<SpiderRegistry<I>>,
        pipelines: PipelineChain<I>,
        seeds: Vec<String>,
        config: CrawlerConfig,
        stop_on_ctrl_c: bool,
        stats: Arc<StatCollector>,
    ) -> Self {
        Crawler {
            scheduler,
            req_rx,
            state,
            stats,
            downloader,
            registry,
            pipelines,
            seeds,
            config,
            stop_on_ctrl_c,
        }
    }

    /// Returns a handle that can stop this crawl from any task.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.state))
    }

    /// Returns a cloned Arc to the `StatCollector` instance used by this crawler.
    ///
    /// This allows programmatic access to the collected statistics at any time during or after the crawl.
    pub fn get_stats(&self) -> Arc<StatCollector> {
        Arc::clone(&self.stats)
    }

    /// Returns the frontier, e.g. to inspect job states after a crawl.
    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn registry(&self) -> &SpiderRegistry<I> {
        &self.registry
    }

    /// Seed URLs, in the order they will be enqueued.
    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Runs the crawl to completion and returns its summary.
    ///
    /// Fails only when the engine itself misbehaved (an item pushed to a
    /// closed stream or an illegal job transition). Fetch and spider errors
    /// are contained per job and show up in the summary's counters.
    pub async fn start_crawl(self) -> Result<CrawlSummary, SpiderError> {
        let Crawler {
            scheduler,
            req_rx,
            state,
            stats,
            downloader,
            registry,
            pipelines,
            seeds,
            config,
            stop_on_ctrl_c,
        } = self;

        info!(
            "Crawler starting crawl with configuration: max_concurrent_downloads={}, item_channel_capacity={:?}, compression={}, max_retries={}",
            config.max_concurrent_downloads,
            config.item_channel_capacity,
            config.compression,
            config.max_retries
        );
        state.start();

        let (item_tx, item_rx) = match config.item_channel_capacity {
            Some(capacity) => {
                trace!("Creating bounded item stream with capacity {}", capacity);
                bounded_async(capacity)
            }
            None => {
                trace!("Creating unbounded item stream");
                unbounded_async()
            }
        };

        let pipelines = Arc::new(pipelines);

        trace!("Spawning item processor task");
        let item_processor_task = spawn_item_processor_task(
            item_rx,
            Arc::clone(&pipelines),
            Arc::clone(&stats),
        );

        trace!("Spawning downloader task");
        let mut downloader_task = spawn_downloader_task(
            Arc::clone(&scheduler),
            req_rx,
            downloader,
            registry,
            Arc::clone(&state),
            item_tx.clone(),
            Arc::clone(&stats),
            WorkerConfig {
                workers: config.max_concurrent_downloads,
                max_retries: config.max_retries,
                retry_backoff: config.retry_backoff,
                abort_in_flight_on_stop: config.abort_in_flight_on_stop,
            },
        );

        let enqueued = scheduler.enqueue_seeds(&seeds).await;
        stats.add_jobs_enqueued(enqueued);
        if enqueued == 0 {
            warn!("No seed jobs were enqueued, the crawl will end immediately.");
        }

        let stop = state.stop_token();
        tokio::select! {
            _ = state.await_drained() => {
                info!("Frontier drained, initiating shutdown.");
            }
            _ = stop.cancelled() => {
                info!("Stop requested, initiating graceful shutdown.");
            }
            _ = ctrl_c(stop_on_ctrl_c) => {
                info!("Ctrl-C received, initiating graceful shutdown.");
            }
        }

        state.request_stop();

        let drained = match config.drain_timeout {
            Some(timeout) => tokio::time::timeout(timeout, state.await_drained())
                .await
                .is_ok(),
            None => {
                state.await_drained().await;
                true
            }
        };

        trace!("Closing request queue");
        scheduler.close();

        if drained {
            if let Err(e) = (&mut downloader_task).await {
                error!("Downloader task failed during shutdown: {}", e);
            }
        } else {
            warn!(
                "{} jobs still live after {:?}, aborting workers.",
                state.live_jobs(),
                config.drain_timeout
            );
            downloader_task.abort();
            if let Err(e) = downloader_task.await {
                if !e.is_cancelled() {
                    error!("Downloader task failed during shutdown: {}", e);
                }
            }
        }

        trace!("Closing item stream");
        drop(item_tx);
        if let Err(e) = item_processor_task.await {
            error!("Item processor task failed during shutdown: {}", e);
        }

        info!("Closing item pipelines...");
        if let Err(e) = pipelines.close().await {
            error!("Failed to close item pipelines: {}", e);
        }
        debug!("All item pipelines closed");

        let summary = stats.snapshot();
        info!("Crawl finished. {}", summary);

        match state.take_violation() {
            Some(violation) => Err(violation),
            None => Ok(summary),
        }
    }
}

async fn ctrl_c(enabled: bool) {
    if !enabled {
        return std::future::pending().await;
    }
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
