//! Crawls dmoztools.net listing pages and prints every listed site as one
//! JSON line on stdout.
//!
//! ```text
//! cargo run --bin dmoz -- [URL...]
//! ```
//!
//! The crawl ends once every page has been handled, or on Ctrl-C.

use anyhow::anyhow;
use clap::Parser;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use spider_dispatch::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_START_URLS: [&str; 2] = [
    "http://dmoztools.net/Computers/Programming/Languages/Python/Books/",
    "http://dmoztools.net/Computers/Programming/Languages/Python/Resources/",
];

#[derive(Parser, Debug)]
#[command(about = "Scrape dmoztools.net site listings as JSON lines")]
struct Args {
    /// Listing pages to start from.
    urls: Vec<String>,

    /// Number of concurrent fetch + parse workers.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Disable gzip/brotli/deflate negotiation.
    #[arg(long)]
    no_compression: bool,
}

#[derive(Debug, Clone, Serialize)]
struct Listing {
    title: String,
    link: String,
    desc: String,
}

struct DmozSpider {
    entries: Selector,
    title: Selector,
    link: Selector,
    desc: Selector,
}

impl DmozSpider {
    fn new() -> anyhow::Result<Self> {
        Ok(DmozSpider {
            entries: selector("#site-list-content > div")?,
            title: selector(".site-title")?,
            link: selector("a[href]")?,
            desc: selector("[class*=\"site-descr\"]")?,
        })
    }

    fn listings(&self, html: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        document
            .select(&self.entries)
            .map(|entry| Listing {
                title: inner_text(entry, &self.title),
                link: entry
                    .select(&self.link)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .unwrap_or_default()
                    .to_string(),
                desc: inner_text(entry, &self.desc),
            })
            .collect()
    }
}

#[async_trait]
impl Spider for DmozSpider {
    type Item = Listing;

    fn name(&self) -> &str {
        "dmoz"
    }

    async fn parse(
        &self,
        response: Response,
        output: &ItemEmitter<Listing>,
    ) -> Result<(), SpiderError> {
        if !response.is_success() {
            warn!("Skipping {} ({})", response.request_url, response.status);
            return Ok(());
        }
        // The parsed document is not Send, so extraction finishes before
        // the first emit.
        let listings = self.listings(&response.text());
        for listing in listings {
            output.emit(listing).await?;
        }
        Ok(())
    }
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

fn inner_text(entry: ElementRef<'_>, selector: &Selector) -> String {
    entry
        .select(selector)
        .next()
        .map(|node| node.text().collect())
        .unwrap_or_default()
}

fn trim_listing(mut listing: Listing) -> Listing {
    listing.title = listing.title.trim().to_string();
    listing.desc = listing.desc.trim().to_string();
    listing
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let urls = if args.urls.is_empty() {
        DEFAULT_START_URLS.iter().map(|u| u.to_string()).collect()
    } else {
        args.urls
    };

    let crawler = CrawlerBuilder::new()
        .compression(!args.no_compression)
        .max_concurrent_downloads(args.workers)
        .add_spider("dmoztools.net", DmozSpider::new()?)
        .add_pipeline(MapPipeline::new("trim_space", trim_listing))
        .add_pipeline(JsonLinesWriterPipeline::stdout())
        .start_urls(urls)
        .stop_on_ctrl_c(true)
        .build()?;

    let summary = crawler.start_crawl().await?;
    info!("{}", summary);
    eprintln!("exiting crawler");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div id="site-list-content">
          <div class="site-item">
            <div class="title-and-desc">
              <a href="http://example.com/book"><div class="site-title">  Learning Python  </div></a>
              <div class="site-descr ">
                 A gentle introduction.
              </div>
            </div>
          </div>
          <div class="site-item">
            <a href="http://example.com/other"><div class="site-title">Other</div></a>
          </div>
        </div>
    "#;

    #[test]
    fn extracts_listings_in_document_order() {
        let spider = DmozSpider::new().unwrap();
        let listings = spider.listings(PAGE);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].link, "http://example.com/book");
        assert_eq!(listings[1].title, "Other");
        assert_eq!(listings[1].desc, "");

        let trimmed = trim_listing(listings[0].clone());
        assert_eq!(trimmed.title, "Learning Python");
        assert_eq!(trimmed.desc, "A gentle introduction.");
    }
}
