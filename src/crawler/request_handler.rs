//! Contains the worker pool that executes frontier jobs.
//!
//! Each worker repeatedly pulls a request from the scheduler queue and runs
//! the whole job for it:
//!
//! - skips it (`Queued -> Done`) if a stop was requested before it started,
//! - fetches it (`Fetching`), retrying only when `max_retries > 0`,
//! - on failure logs and finishes it (`FetchFailed -> Done`),
//! - on success routes the response to its spider (`SpiderRunning -> Done`).
//!
//! A fetch already on the wire is allowed to complete after a stop request
//! unless `abort_in_flight_on_stop` is set. Workers exit once the scheduler
//! queue is closed.

use crate::Downloader;
use crate::crawler::response_parser::dispatch_response;
use crate::error::{FetchError, SpiderError};
use crate::registry::SpiderRegistry;
use crate::request::Request;
use crate::response::Response;
use crate::scheduler::{JobState, Scheduler};
use crate::spider::{ItemEmitter, ScrapedItem};
use crate::state::CrawlerState;
use crate::stats::StatCollector;

use kanal::{AsyncReceiver, AsyncSender};
use log::{debug, error, trace, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Settings a worker needs from `CrawlerConfig`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WorkerConfig {
    pub workers: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub abort_in_flight_on_stop: bool,
}

struct Worker<I: ScrapedItem> {
    scheduler: Arc<Scheduler>,
    downloader: Arc<dyn Downloader>,
    registry: Arc<SpiderRegistry<I>>,
    state: Arc<CrawlerState>,
    item_tx: AsyncSender<I>,
    stats: Arc<StatCollector>,
    config: WorkerConfig,
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn spawn_downloader_task<I: ScrapedItem>(
    scheduler: Arc<Scheduler>,
    req_rx: AsyncReceiver<Request>,
    downloader: Arc<dyn Downloader>,
    registry: Arc<SpiderRegistry<I>>,
    state: Arc<CrawlerState>,
    item_tx: AsyncSender<I>,
    stats: Arc<StatCollector>,
    config: WorkerConfig,
) -> tokio::task::JoinHandle<()> {
    let worker = Arc::new(Worker {
        scheduler,
        downloader,
        registry,
        state,
        item_tx,
        stats,
        config,
    });

    tokio::spawn(async move {
        trace!("Downloader task started with {} workers", config.workers);
        let mut tasks = JoinSet::new();
        for id in 0..config.workers {
            let worker = Arc::clone(&worker);
            let req_rx = req_rx.clone();
            tasks.spawn(async move {
                while let Ok(request) = req_rx.recv().await {
                    worker.run_job(request).await;
                }
                trace!("Worker {} finished, request queue closed", id);
            });
        }
        drop(worker);

        while let Some(res) = tasks.join_next().await {
            if let Err(e) = res {
                error!("A worker task failed: {:?}", e);
            }
        }
        trace!("Downloader task finished");
    })
}

impl<I: ScrapedItem> Worker<I> {
    async fn run_job(&self, request: Request) {
        let fingerprint = request.fingerprint();

        if self.state.is_stopping() {
            debug!("Stop requested, skipping queued job {}", fingerprint);
            self.stats.increment_jobs_skipped();
            self.finish(&fingerprint);
            return;
        }

        if !self.advance(&fingerprint, JobState::Fetching) {
            return;
        }

        let fetched = self.fetch(request).await;

        match fetched {
            Ok(response) => {
                if !self.advance(&fingerprint, JobState::SpiderRunning) {
                    return;
                }
                let emitter = ItemEmitter::new(
                    self.item_tx.clone(),
                    Arc::clone(&self.scheduler),
                    Arc::clone(&self.state),
                    Arc::clone(&self.stats),
                );
                let outcome =
                    dispatch_response(&self.registry, response, &emitter, &self.stats).await;
                trace!("Job {} dispatched: {:?}", fingerprint, outcome);
            }
            Err(e) => {
                warn!("Fetch failed for {}: {}", fingerprint, e);
                if !self.advance(&fingerprint, JobState::FetchFailed) {
                    return;
                }
            }
        }

        self.finish(&fingerprint);
    }

    async fn fetch(&self, request: Request) -> Result<Response, FetchError> {
        let mut attempt = 0;
        loop {
            self.stats.increment_requests_sent();
            let start_time = Instant::now();
            let result = self.download_once(request.clone()).await;

            match result {
                Ok(response) => {
                    trace!(
                        "Download successful for URL: {}, took {:?}",
                        response.url,
                        start_time.elapsed()
                    );
                    self.stats.increment_requests_succeeded();
                    self.stats.increment_responses_received();
                    self.stats.record_response_status(response.status.as_u16());
                    self.stats.add_bytes_downloaded(response.body.len());
                    return Ok(response);
                }
                Err(e) => {
                    self.stats.increment_requests_failed();
                    let retryable = !matches!(e, FetchError::Aborted { .. })
                        && attempt < self.config.max_retries
                        && !self.state.is_stopping();
                    if !retryable {
                        return Err(e);
                    }

                    let delay = self
                        .config
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    attempt += 1;
                    debug!(
                        "Retrying {} in {:?} (attempt {} of {}): {}",
                        request.url, delay, attempt, self.config.max_retries, e
                    );
                    self.stats.increment_requests_retried();
                    let stop = self.state.stop_token();
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop.cancelled() => return Err(e),
                    }
                }
            }
        }
    }

    async fn download_once(&self, request: Request) -> Result<Response, FetchError> {
        if !self.config.abort_in_flight_on_stop {
            return self.downloader.download(request).await;
        }
        let url = request.url.to_string();
        let stop = self.state.stop_token();
        tokio::select! {
            result = self.downloader.download(request) => result,
            _ = stop.cancelled() => {
                debug!("Aborting in-flight fetch of {}", url);
                Err(FetchError::Aborted { url })
            }
        }
    }

    /// Moves the job forward; an illegal step is recorded as a violation.
    fn advance(&self, fingerprint: &str, to: JobState) -> bool {
        match self.scheduler.transition(fingerprint, to) {
            Ok(_) => true,
            Err(e) => {
                self.abandon(e);
                false
            }
        }
    }

    fn finish(&self, fingerprint: &str) {
        match self.scheduler.complete(fingerprint) {
            Ok(()) => self.stats.increment_jobs_done(),
            Err(e) => self.abandon(e),
        }
    }

    // The crawl is failing at this point, but the live count still has to
    // reach zero for the drain to finish. A job that was already done has
    // released its count.
    fn abandon(&self, err: SpiderError) {
        let already_done = matches!(
            err,
            SpiderError::InvalidTransition {
                from: Some(JobState::Done),
                ..
            }
        );
        self.state.record_violation(err);
        if !already_done {
            self.state.record_job_done();
        }
    }
}
