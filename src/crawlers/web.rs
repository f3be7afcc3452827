use crate::cleanup;
use crate::crawlers::fetcher::Fetcher;
use crate::error::{CrawlError, ExtractionError, FetchError};
use crate::extract::{self, ExtractOptions};
use crate::filter::{UrlFilter, resolve_href};
use crate::parsers::html;
use crate::render::{self, RenderOptions};
use crate::results::PageRecord;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use url::Url;

/// Capacity of the record channel returned by [`start`].
const RESULT_CHANNEL_CAPACITY: usize = 1000;

/// Per-crawl settings for the page pipeline.
#[derive(Debug, Clone, Default)]
pub struct CrawlSettings {
    /// Stop once this many records have been produced.
    pub max_pages: Option<usize>,
    pub extract: ExtractOptions,
    pub render: RenderOptions,
}

/// BFS work queue plus the set of URLs already taken from it.
///
/// A URL is marked visited when it is dequeued, before it is processed, and
/// is never queued again after that.
#[derive(Debug, Clone)]
pub struct Frontier {
    queue: VecDeque<Url>,
    queued: HashSet<Url>,
    visited: HashSet<Url>,
    filter: UrlFilter,
}

impl Frontier {
    pub fn new(seed: Url, filter: UrlFilter) -> Self {
        let mut seed = seed;
        seed.set_fragment(None);

        let mut frontier = Self {
            queue: VecDeque::new(),
            queued: HashSet::new(),
            visited: HashSet::new(),
            filter,
        };
        frontier.enqueue(seed);
        frontier
    }

    /// Dequeue the next URL and mark it visited.
    pub fn next_url(&mut self) -> Option<Url> {
        while let Some(url) = self.queue.pop_front() {
            self.queued.remove(&url);
            if self.visited.insert(url.clone()) {
                return Some(url);
            }
        }
        None
    }

    /// Queue every in-scope link of `raw_markup` not seen before.
    /// Returns how many URLs were added.
    pub fn discover(&mut self, current: &Url, raw_markup: &str) -> usize {
        let mut added = 0;
        for href in html::parse_links_only(raw_markup) {
            let resolved = match resolve_href(current, &href) {
                Ok(url) => url,
                Err(e) => {
                    ::log::debug!("Skipping link: {}", e);
                    continue;
                }
            };

            if self.is_known(&resolved) {
                ::log::trace!("Already visited or queued: {}", resolved);
                continue;
            }
            if !self.filter.should_crawl(&resolved) {
                ::log::debug!("URL filter rejected: {}", resolved);
                continue;
            }

            ::log::info!("Queuing link for crawling: {}", resolved);
            self.enqueue(resolved);
            added += 1;
        }
        added
    }

    pub fn is_known(&self, url: &Url) -> bool {
        self.visited.contains(url) || self.queued.contains(url)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    fn enqueue(&mut self, url: Url) {
        if self.queued.insert(url.clone()) {
            self.queue.push_back(url);
        }
    }
}

/// Spawn a crawl on the runtime and return a receiver yielding records as
/// they are produced. The channel closes when the crawl ends.
pub fn start(
    fetcher: Arc<dyn Fetcher>,
    frontier: Frontier,
    settings: CrawlSettings,
) -> mpsc::Receiver<PageRecord> {
    let (result_tx, result_rx) = mpsc::channel::<PageRecord>(RESULT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut frontier = frontier;
        let produced = run(fetcher.as_ref(), &mut frontier, &settings, &result_tx).await;
        fetcher.shutdown().await;
        ::log::info!(
            "Crawl finished: {} records, {} URLs visited",
            produced,
            frontier.visited_len()
        );
    });

    result_rx
}

/// Crawl to completion and collect the records in BFS order. The fetcher is
/// shut down afterwards.
pub async fn crawl(
    fetcher: &dyn Fetcher,
    seed: &str,
    scope_patterns: &[String],
    settings: &CrawlSettings,
) -> Result<Vec<PageRecord>, CrawlError> {
    let seed_url = Url::parse(seed).map_err(|source| CrawlError::InvalidSeed {
        url: seed.to_string(),
        source,
    })?;
    let filter = UrlFilter::new(&seed_url, scope_patterns)?;
    let mut frontier = Frontier::new(seed_url, filter);

    let (result_tx, mut result_rx) = mpsc::channel::<PageRecord>(RESULT_CHANNEL_CAPACITY);
    let crawl = async move {
        run(fetcher, &mut frontier, settings, &result_tx).await;
    };
    let collect = async {
        let mut records = Vec::new();
        while let Some(record) = result_rx.recv().await {
            records.push(record);
        }
        records
    };
    let ((), records) = tokio::join!(crawl, collect);
    fetcher.shutdown().await;

    Ok(records)
}

/// The crawl loop. Processes URLs one at a time until the frontier is empty,
/// the page cap is reached, or the receiver goes away. Returns the number of
/// records sent.
pub async fn run(
    fetcher: &dyn Fetcher,
    frontier: &mut Frontier,
    settings: &CrawlSettings,
    result_tx: &mpsc::Sender<PageRecord>,
) -> usize {
    let mut produced = 0;

    while let Some(url) = frontier.next_url() {
        ::log::debug!("Processing: {}", url);

        let raw = match fetch_html(fetcher, &url).await {
            Ok(raw) => raw,
            Err(e) => {
                ::log::warn!("Skipping {}: {}", url, e);
                continue;
            }
        };

        match process_page(&url, &raw, settings) {
            Ok(record) => {
                if result_tx.send(record).await.is_err() {
                    ::log::debug!("Result receiver closed, stopping crawl");
                    return produced;
                }
                produced += 1;
            }
            Err(e) => ::log::warn!("No content extracted from {}: {}", url, e),
        }

        let added = frontier.discover(&url, &raw);
        ::log::debug!("Found {} new links in {}", added, url);

        if settings.max_pages.is_some_and(|max| produced >= max) {
            ::log::info!(
                "Reached page cap of {}, dropping {} queued URLs",
                produced,
                frontier.queued_len()
            );
            break;
        }
    }

    produced
}

async fn fetch_html(fetcher: &dyn Fetcher, url: &Url) -> Result<String, FetchError> {
    fetcher.fetch(url).await?.into_html(url)
}

/// Extract, render and clean one fetched page.
pub fn process_page(
    url: &Url,
    raw: &str,
    settings: &CrawlSettings,
) -> Result<PageRecord, ExtractionError> {
    let extracted = extract::extract_with_options(raw, &settings.extract)?;
    let rendered = render::render(&extracted.content, &settings.render);
    let markdown = cleanup::clean(&rendered, url);
    Ok(PageRecord::new(
        url.clone(),
        extracted.title,
        markdown,
        raw.to_string(),
    ))
}
