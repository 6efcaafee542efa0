#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use spider_dispatch::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub page: String,
    pub title: String,
    pub desc: String,
}

/// Understands a tiny line format:
///
/// ```text
/// item: <title> | <desc>
/// link: <relative or absolute url>
/// fail
/// ```
pub struct LineSpider;

#[async_trait]
impl Spider for LineSpider {
    type Item = Listing;

    fn name(&self) -> &str {
        "lines"
    }

    async fn parse(
        &self,
        response: Response,
        output: &ItemEmitter<Listing>,
    ) -> Result<(), SpiderError> {
        let page = response.request_url.path().to_string();
        for line in response.text().lines() {
            let line = line.trim_start();
            if let Some(rest) = line.strip_prefix("item:") {
                let (title, desc) = rest.split_once('|').unwrap_or((rest, ""));
                output
                    .emit(Listing {
                        page: page.clone(),
                        title: title.to_string(),
                        desc: desc.to_string(),
                    })
                    .await?;
            } else if let Some(link) = line.strip_prefix("link:") {
                let url = response.url.join(link.trim())?;
                output.follow(url).await?;
            } else if line == "fail" {
                return Err(SpiderError::extraction("page marked as failing"));
            }
        }
        Ok(())
    }
}

/// Sink stage that keeps every record in memory.
#[derive(Clone, Default)]
pub struct CollectPipeline {
    items: Arc<Mutex<Vec<Listing>>>,
    delay: Option<Duration>,
}

impl CollectPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn items(&self) -> Vec<Listing> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pipeline<Listing> for CollectPipeline {
    fn name(&self) -> &str {
        "collect"
    }

    async fn process_item(
        &self,
        item: Listing,
        next: Next<'_, Listing>,
    ) -> Result<(), PipelineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.items.lock().unwrap().push(item.clone());
        next.run(item).await
    }
}

pub fn trim_listing(mut listing: Listing) -> Listing {
    listing.title = listing.title.trim().to_string();
    listing.desc = listing.desc.trim().to_string();
    listing
}

/// Serves pages from memory; unknown URLs fail like a refused connection.
#[derive(Default)]
pub struct MemoryDownloader {
    pages: HashMap<String, String>,
    failures_before_success: usize,
    attempts: Arc<AtomicUsize>,
    latency: Option<Duration>,
}

impl MemoryDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    /// Fails the first `count` downloads, whatever the URL.
    pub fn flaky(mut self, count: usize) -> Self {
        self.failures_before_success = count;
        self
    }

    /// Delays every download, like a slow server.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Downloader for MemoryDownloader {
    async fn download(&self, request: Request) -> Result<Response, FetchError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let url = request.url.to_string();
        if attempt < self.failures_before_success {
            return Err(FetchError::Other {
                url,
                message: "connection reset".to_string(),
            });
        }
        match self.pages.get(&url) {
            Some(body) => Ok(Response::new(
                request.url,
                reqwest::StatusCode::OK,
                body.clone(),
            )),
            None => Err(FetchError::Other {
                url,
                message: "connection refused".to_string(),
            }),
        }
    }
}

pub fn url(raw: &str) -> Url {
    Url::parse(raw).unwrap()
}
