//! Module for tracking the run state of a crawl.
//!
//! `CrawlerState` is the single synchronized object behind frontier
//! completion and shutdown. It holds:
//! - the number of live jobs (queued or running, not yet done),
//! - whether the frontier still accepts new work,
//! - the stop token observed by every worker,
//! - the first invariant violation seen, if any.
//!
//! Lifecycle: `start` → (`record_job_start` / `record_job_done`)* →
//! `request_stop` (optional) → `await_drained`.

use crate::error::SpiderError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Shared run state of one crawl.
#[derive(Debug, Default)]
pub struct CrawlerState {
    live_jobs: AtomicUsize,
    accepting: AtomicBool,
    stop: CancellationToken,
    drained: Notify,
    violation: Mutex<Option<SpiderError>>,
}

impl CrawlerState {
    /// Creates a new, atomically reference-counted `CrawlerState`.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Opens the frontier for work.
    pub fn start(&self) {
        if !self.stop.is_cancelled() {
            self.accepting.store(true, Ordering::SeqCst);
        }
    }

    /// Whether new jobs may be enqueued.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Counts a new live job. Returns false, without counting, once intake
    /// has been closed.
    pub fn record_job_start(&self) -> bool {
        if !self.is_accepting() {
            return false;
        }
        self.live_jobs.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Marks one live job as done and wakes drain waiters when it was the last.
    pub fn record_job_done(&self) {
        match self
            .live_jobs
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        {
            Ok(1) => {
                debug!("Last live job finished");
                self.drained.notify_waiters();
            }
            Ok(_) => {}
            Err(_) => error!("record_job_done called with no live jobs"),
        }
    }

    pub fn live_jobs(&self) -> usize {
        self.live_jobs.load(Ordering::SeqCst)
    }

    /// Closes intake and signals every worker. Idempotent.
    pub fn request_stop(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            debug!("Stop requested, frontier no longer accepts work");
        }
        self.stop.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Token cancelled by [`request_stop`](Self::request_stop).
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Resolves once the live job count is zero.
    pub async fn await_drained(&self) {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.live_jobs() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stores the first invariant violation and stops the crawl.
    pub fn record_violation(&self, err: SpiderError) {
        error!("Invariant violation: {}", err);
        if let Ok(mut slot) = self.violation.lock() {
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.request_stop();
    }

    pub fn take_violation(&self) -> Option<SpiderError> {
        self.violation.lock().ok().and_then(|mut slot| slot.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn jobs_are_refused_before_start_and_after_stop() {
        let state = CrawlerState::new();
        assert!(!state.record_job_start());
        state.start();
        assert!(state.record_job_start());
        state.request_stop();
        assert!(!state.record_job_start());
        assert_eq!(state.live_jobs(), 1);
        assert!(state.is_stopping());
    }

    #[test]
    fn start_after_stop_keeps_intake_closed() {
        let state = CrawlerState::new();
        state.request_stop();
        state.start();
        assert!(!state.is_accepting());
    }

    #[tokio::test]
    async fn await_drained_returns_immediately_when_empty() {
        let state = CrawlerState::new();
        state.start();
        tokio::time::timeout(Duration::from_millis(100), state.await_drained())
            .await
            .expect("no live jobs, should not wait");
    }

    #[tokio::test]
    async fn await_drained_wakes_on_last_job() {
        let state = CrawlerState::new();
        state.start();
        for _ in 0..3 {
            state.record_job_start();
        }

        let worker = Arc::clone(&state);
        tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                worker.record_job_done();
            }
        });

        tokio::time::timeout(Duration::from_secs(1), state.await_drained())
            .await
            .expect("drain should be signalled");
        assert_eq!(state.live_jobs(), 0);
    }

    #[test]
    fn done_without_live_job_does_not_underflow() {
        let state = CrawlerState::new();
        state.record_job_done();
        assert_eq!(state.live_jobs(), 0);
    }

    #[test]
    fn first_violation_wins_and_stops() {
        let state = CrawlerState::new();
        state.start();
        state.record_violation(SpiderError::StreamClosed);
        state.record_violation(SpiderError::GeneralError("later".into()));
        assert!(state.is_stopping());
        assert!(matches!(
            state.take_violation(),
            Some(SpiderError::StreamClosed)
        ));
        assert!(state.take_violation().is_none());
    }
}
