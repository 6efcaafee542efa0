//! # Statistics Module
//!
//! Collects counters about a crawl as it runs.
//!
//! ## Key Metrics Tracked
//!
//! - **Jobs**: enqueued, done, and skipped because of a stop request
//! - **Requests**: sent, succeeded, failed, retried
//! - **Responses**: received, bytes downloaded, status codes, responses with
//!   no registered spider
//! - **Items**: scraped (pushed on the stream), processed by the chain,
//!   failed in a pipeline stage, spider errors
//!
//! All counters are atomics so workers update them without locking. A
//! [`CrawlSummary`] snapshot is returned by
//! [`Crawler::start_crawl`](crate::Crawler::start_crawl).

use crate::error::SpiderError;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};

/// A point-in-time copy of the collected statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct CrawlSummary {
    pub jobs_enqueued: usize,
    pub jobs_done: usize,
    pub jobs_skipped: usize,
    pub requests_sent: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub requests_retried: usize,
    pub responses_received: usize,
    pub responses_unrouted: usize,
    pub total_bytes_downloaded: usize,
    pub spider_errors: usize,
    pub items_scraped: usize,
    pub items_processed: usize,
    pub items_failed: usize,
    pub response_status_counts: HashMap<u16, usize>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CrawlSummary {
    fn items_per_second(&self) -> f64 {
        let total_seconds = self.elapsed.as_secs_f64();
        if total_seconds > 0.0 {
            self.items_scraped as f64 / total_seconds
        } else {
            0.0
        }
    }

    fn formatted_bytes(&self) -> String {
        const KB: usize = 1024;
        const MB: usize = 1024 * KB;

        if self.total_bytes_downloaded >= MB {
            format!("{:.2} MB", self.total_bytes_downloaded as f64 / MB as f64)
        } else if self.total_bytes_downloaded >= KB {
            format!("{:.2} KB", self.total_bytes_downloaded as f64 / KB as f64)
        } else {
            format!("{} B", self.total_bytes_downloaded)
        }
    }
}

/// Collects and stores various statistics about the crawler's operation.
#[derive(Debug, serde::Serialize)]
pub struct StatCollector {
    #[serde(skip)]
    pub start_time: Instant,

    pub jobs_enqueued: AtomicUsize,
    pub jobs_done: AtomicUsize,
    pub jobs_skipped: AtomicUsize,

    pub requests_sent: AtomicUsize,
    pub requests_succeeded: AtomicUsize,
    pub requests_failed: AtomicUsize,
    pub requests_retried: AtomicUsize,

    pub responses_received: AtomicUsize,
    pub responses_unrouted: AtomicUsize,
    pub response_status_counts: Arc<dashmap::DashMap<u16, usize>>,
    pub total_bytes_downloaded: AtomicUsize,

    pub spider_errors: AtomicUsize,
    pub items_scraped: AtomicUsize,
    pub items_processed: AtomicUsize,
    pub items_failed: AtomicUsize,
}

impl StatCollector {
    /// Creates a new `StatCollector` with all counters initialized to zero.
    pub fn new() -> Self {
        StatCollector {
            start_time: Instant::now(),
            jobs_enqueued: AtomicUsize::new(0),
            jobs_done: AtomicUsize::new(0),
            jobs_skipped: AtomicUsize::new(0),
            requests_sent: AtomicUsize::new(0),
            requests_succeeded: AtomicUsize::new(0),
            requests_failed: AtomicUsize::new(0),
            requests_retried: AtomicUsize::new(0),
            responses_received: AtomicUsize::new(0),
            responses_unrouted: AtomicUsize::new(0),
            response_status_counts: Arc::new(dashmap::DashMap::new()),
            total_bytes_downloaded: AtomicUsize::new(0),
            spider_errors: AtomicUsize::new(0),
            items_scraped: AtomicUsize::new(0),
            items_processed: AtomicUsize::new(0),
            items_failed: AtomicUsize::new(0),
        }
    }

    /// Creates a snapshot of the current statistics.
    pub fn snapshot(&self) -> CrawlSummary {
        let response_status_counts = self
            .response_status_counts
            .iter()
            .map(|entry| (*entry.key(), *entry.value()))
            .collect();

        CrawlSummary {
            jobs_enqueued: self.jobs_enqueued.load(Ordering::SeqCst),
            jobs_done: self.jobs_done.load(Ordering::SeqCst),
            jobs_skipped: self.jobs_skipped.load(Ordering::SeqCst),
            requests_sent: self.requests_sent.load(Ordering::SeqCst),
            requests_succeeded: self.requests_succeeded.load(Ordering::SeqCst),
            requests_failed: self.requests_failed.load(Ordering::SeqCst),
            requests_retried: self.requests_retried.load(Ordering::SeqCst),
            responses_received: self.responses_received.load(Ordering::SeqCst),
            responses_unrouted: self.responses_unrouted.load(Ordering::SeqCst),
            total_bytes_downloaded: self.total_bytes_downloaded.load(Ordering::SeqCst),
            spider_errors: self.spider_errors.load(Ordering::SeqCst),
            items_scraped: self.items_scraped.load(Ordering::SeqCst),
            items_processed: self.items_processed.load(Ordering::SeqCst),
            items_failed: self.items_failed.load(Ordering::SeqCst),
            response_status_counts,
            elapsed: self.start_time.elapsed(),
        }
    }

    pub(crate) fn increment_jobs_enqueued(&self) {
        self.jobs_enqueued.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn add_jobs_enqueued(&self, count: usize) {
        self.jobs_enqueued.fetch_add(count, Ordering::SeqCst);
    }

    pub(crate) fn increment_jobs_done(&self) {
        self.jobs_done.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_jobs_skipped(&self) {
        self.jobs_skipped.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_succeeded(&self) {
        self.requests_succeeded.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_failed(&self) {
        self.requests_failed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_requests_retried(&self) {
        self.requests_retried.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_responses_received(&self) {
        self.responses_received.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_responses_unrouted(&self) {
        self.responses_unrouted.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a response status code.
    pub(crate) fn record_response_status(&self, status_code: u16) {
        *self.response_status_counts.entry(status_code).or_insert(0) += 1;
    }

    pub(crate) fn add_bytes_downloaded(&self, bytes: usize) {
        self.total_bytes_downloaded
            .fetch_add(bytes, Ordering::SeqCst);
    }

    pub(crate) fn increment_spider_errors(&self) {
        self.spider_errors.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_items_scraped(&self) {
        self.items_scraped.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_items_processed(&self) {
        self.items_processed.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn increment_items_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::SeqCst);
    }

    /// Converts the statistics into a JSON string.
    pub fn to_json_string(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Converts the statistics into a pretty-printed JSON string.
    pub fn to_json_string_pretty(&self) -> Result<String, SpiderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for StatCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CrawlSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\nCrawl Statistics")?;
        writeln!(f, "----------------")?;
        writeln!(f, "  duration : {:?}", self.elapsed)?;
        writeln!(
            f,
            "  jobs     : enqueued: {}, done: {}, skipped: {}",
            self.jobs_enqueued, self.jobs_done, self.jobs_skipped
        )?;
        writeln!(
            f,
            "  requests : sent: {}, ok: {}, fail: {}, retry: {}",
            self.requests_sent, self.requests_succeeded, self.requests_failed, self.requests_retried
        )?;
        writeln!(
            f,
            "  response : received: {}, unrouted: {}, downloaded: {}",
            self.responses_received,
            self.responses_unrouted,
            self.formatted_bytes()
        )?;
        writeln!(
            f,
            "  items    : scraped: {}, processed: {}, failed: {}, spider errors: {}, item/s: {:.2}",
            self.items_scraped,
            self.items_processed,
            self.items_failed,
            self.spider_errors,
            self.items_per_second()
        )?;

        let status_string = if self.response_status_counts.is_empty() {
            "none".to_string()
        } else {
            let mut codes: Vec<_> = self.response_status_counts.iter().collect();
            codes.sort();
            codes
                .into_iter()
                .map(|(code, count)| format!("{}: {}", code, count))
                .collect::<Vec<String>>()
                .join(", ")
        };
        writeln!(f, "  status   : {}", status_string)
    }
}

impl std::fmt::Display for StatCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.snapshot().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let stats = StatCollector::new();
        stats.increment_jobs_enqueued();
        stats.increment_jobs_enqueued();
        stats.increment_jobs_done();
        stats.record_response_status(200);
        stats.record_response_status(200);
        stats.record_response_status(404);
        stats.add_bytes_downloaded(2048);

        let summary = stats.snapshot();
        assert_eq!(summary.jobs_enqueued, 2);
        assert_eq!(summary.jobs_done, 1);
        assert_eq!(summary.response_status_counts.get(&200), Some(&2));
        assert_eq!(summary.response_status_counts.get(&404), Some(&1));

        let rendered = summary.to_string();
        assert!(rendered.contains("2.00 KB"));
        assert!(rendered.contains("200: 2, 404: 1"));
    }

    #[test]
    fn json_export_includes_counters() {
        let stats = StatCollector::new();
        stats.increment_items_scraped();
        let json = stats.to_json_string().unwrap();
        assert!(json.contains("\"items_scraped\":1"));
    }
}
