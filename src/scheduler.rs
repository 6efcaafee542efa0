//! # Scheduler Module
//!
//! Implements the frontier: the queue of URLs to fetch and the lifecycle of
//! every job created from them.
//!
//! ## Overview
//!
//! Each accepted URL becomes a job keyed by its fingerprint. A job moves
//! through
//!
//! ```text
//! Queued -> Fetching -> SpiderRunning -> Done
//!                    \-> FetchFailed  -> Done
//! Queued -> Done            (skipped after a stop request)
//! ```
//!
//! and every transition is validated. A job counts as live on the shared
//! [`CrawlerState`] from the moment it is queued until it reaches `Done`, so
//! URLs discovered while spidering extend the crawl: the frontier is finished
//! only when the live count reaches zero.
//!
//! Known fingerprints are never enqueued twice, which makes every URL reach
//! `Done` at most once per crawl.
//!
//! ## Example
//!
//! ```rust,ignore
//! let state = CrawlerState::new();
//! state.start();
//! let (scheduler, request_receiver) = Scheduler::new(state);
//!
//! scheduler.enqueue_request(Request::parse("https://example.com")?).await?;
//! ```

use crate::error::SpiderError;
use crate::request::Request;
use crate::state::CrawlerState;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use kanal::{AsyncReceiver, AsyncSender, unbounded_async};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Lifecycle state of one frontier job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum JobState {
    Queued,
    Fetching,
    SpiderRunning,
    FetchFailed,
    Done,
}

impl JobState {
    /// Whether `self -> to` is a legal step.
    pub fn can_transition_to(self, to: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, to),
            (Queued, Fetching)
                | (Queued, Done)
                | (Fetching, SpiderRunning)
                | (Fetching, FetchFailed)
                | (SpiderRunning, Done)
                | (FetchFailed, Done)
        )
    }
}

pub struct Scheduler {
    state: Arc<CrawlerState>,
    jobs: DashMap<String, JobState>,
    tx: AsyncSender<Request>,
}

impl Scheduler {
    /// Creates a new `Scheduler` and returns it with the receiving end of the
    /// request queue that workers pull from.
    pub fn new(state: Arc<CrawlerState>) -> (Arc<Self>, AsyncReceiver<Request>) {
        let (tx, rx) = unbounded_async();
        let scheduler = Arc::new(Scheduler {
            state,
            jobs: DashMap::new(),
            tx,
        });
        (scheduler, rx)
    }

    /// Enqueues a request as a new `Queued` job.
    ///
    /// Returns `Ok(false)` when the request was not enqueued because intake
    /// is closed or the URL is already known.
    pub async fn enqueue_request(&self, request: Request) -> Result<bool, SpiderError> {
        if !self.state.is_accepting() {
            trace!("Intake closed, skipping request: {}", request.url);
            return Ok(false);
        }

        let fingerprint = request.fingerprint();
        match self.jobs.entry(fingerprint.clone()) {
            Entry::Occupied(_) => {
                trace!("Request already known, skipping: {}", request.url);
                return Ok(false);
            }
            Entry::Vacant(slot) => {
                if !self.state.record_job_start() {
                    trace!("Intake closed, skipping request: {}", request.url);
                    return Ok(false);
                }
                slot.insert(JobState::Queued);
            }
        }

        trace!("Enqueuing request: {}", request.url);
        if self.tx.send(request).await.is_err() {
            error!(
                "Scheduler queue is closed, dropping request: {}",
                fingerprint
            );
            self.complete(&fingerprint)?;
            return Err(SpiderError::GeneralError(
                "Scheduler queue closed, request dropped.".into(),
            ));
        }
        Ok(true)
    }

    /// Parses and enqueues an ordered batch of seed URLs.
    ///
    /// Invalid URLs are logged and skipped. Returns the number of new jobs.
    pub async fn enqueue_seeds<U>(&self, urls: impl IntoIterator<Item = U>) -> usize
    where
        U: AsRef<str>,
    {
        let mut accepted = 0;
        for raw in urls {
            let raw = raw.as_ref();
            match Request::parse(raw) {
                Ok(request) => match self.enqueue_request(request).await {
                    Ok(true) => accepted += 1,
                    Ok(false) => {}
                    Err(e) => error!("Failed to enqueue seed {}: {}", raw, e),
                },
                Err(e) => warn!("Ignoring invalid seed URL '{}': {}", raw, e),
            }
        }
        debug!("Enqueued {} seed jobs", accepted);
        accepted
    }

    /// Moves a job to `to`, returning its previous state.
    pub fn transition(&self, fingerprint: &str, to: JobState) -> Result<JobState, SpiderError> {
        match self.jobs.get_mut(fingerprint) {
            Some(mut job) if job.can_transition_to(to) => {
                let from = *job;
                *job = to;
                trace!("Job {}: {:?} -> {:?}", fingerprint, from, to);
                Ok(from)
            }
            Some(job) => Err(SpiderError::InvalidTransition {
                url: fingerprint.to_string(),
                from: Some(*job),
                to,
            }),
            None => Err(SpiderError::InvalidTransition {
                url: fingerprint.to_string(),
                from: None,
                to,
            }),
        }
    }

    /// Moves a job to `Done` and releases its live count.
    pub fn complete(&self, fingerprint: &str) -> Result<(), SpiderError> {
        self.transition(fingerprint, JobState::Done)?;
        self.state.record_job_done();
        Ok(())
    }

    /// Current state of the job for `url`, if it was ever enqueued.
    pub fn job_state(&self, url: &str) -> Option<JobState> {
        let fingerprint = Request::parse(url)
            .map(|r| r.fingerprint())
            .unwrap_or_else(|_| url.to_string());
        self.jobs.get(&fingerprint).map(|job| *job)
    }

    /// Number of known jobs currently in `state`.
    pub fn jobs_in(&self, state: JobState) -> usize {
        self.jobs.iter().filter(|job| *job.value() == state).count()
    }

    /// Total number of jobs ever accepted.
    pub fn total_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Number of requests waiting in the queue.
    #[inline]
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks if no job is live.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.state.live_jobs() == 0
    }

    /// Closes the request queue; idle workers then exit.
    pub fn close(&self) {
        debug!(
            "Closing scheduler queue with {} known jobs",
            self.total_jobs()
        );
        let _ = self.tx.close();
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
