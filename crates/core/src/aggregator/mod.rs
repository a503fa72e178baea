//! Aggregation across crawlers.
//!
//! Fans a query out to every crawler serving the requested kinds, merges the
//! answers in crawler order, deduplicates and ranks them. A failing (or
//! panicking) crawler only loses its own contribution.

mod dedup;

pub use dedup::{deduplicate, rank};

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::config::SearchConfig;
use crate::content::{ContentCache, ContentItem, KindFilter, TorrentRef};
use crate::crawler::{Crawler, CrawlerError, SearchRequest};
use crate::metrics;

/// Looks content back up by id for the streaming path.
#[async_trait]
pub trait ContentResolver: Send + Sync {
    /// Find a previously served item, re-crawling if it is not cached.
    async fn resolve(&self, content_id: &str) -> Option<ContentItem>;

    /// Magnet for a torrent ref, fetching it from the producing source if the
    /// ref only carries a detail page.
    async fn resolve_magnet(&self, torrent: &TorrentRef) -> Result<Option<String>, CrawlerError>;
}

/// Concurrent fan-out over all configured crawlers.
pub struct Aggregator {
    crawlers: Vec<Arc<dyn Crawler>>,
    cache: ContentCache,
    config: SearchConfig,
}

impl Aggregator {
    pub fn new(crawlers: Vec<Arc<dyn Crawler>>, config: SearchConfig) -> Self {
        let cache = ContentCache::new(
            Duration::from_secs(config.cache_ttl_secs),
            config.cache_capacity,
        );
        Self {
            crawlers,
            cache,
            config,
        }
    }

    /// Clamp a caller-supplied limit into the configured bounds.
    pub fn effective_limit(&self, limit: Option<usize>) -> usize {
        limit
            .unwrap_or(self.config.default_limit)
            .clamp(1, self.config.max_limit.max(1))
    }

    /// Search every crawler matching `kind` and return the ranked, deduplicated union.
    ///
    /// Never fails: total upstream failure yields an empty list.
    pub async fn search_all(
        &self,
        query: &str,
        kind: KindFilter,
        page: u32,
        limit: Option<usize>,
    ) -> Vec<ContentItem> {
        let mut calls = Vec::new();
        for crawler in &self.crawlers {
            for content_kind in kind.kinds() {
                if crawler.kinds().contains(content_kind) {
                    let request = SearchRequest::new(query, *content_kind).with_page(page);
                    calls.push((Arc::clone(crawler), request));
                }
            }
        }

        let futures = calls.into_iter().map(|(crawler, request)| async move {
            let name = crawler.name().to_string();
            let started = Instant::now();
            let outcome = AssertUnwindSafe(crawler.search(&request))
                .catch_unwind()
                .await;
            record_outcome(&name, started, outcome)
        });

        let merged: Vec<ContentItem> = join_all(futures).await.into_iter().flatten().collect();
        let results = self.finish(merged, self.effective_limit(limit)).await;

        info!(
            query = query,
            kind = ?kind,
            page = page,
            results = results.len(),
            "Aggregated search"
        );
        results
    }

    /// Default listings of every crawler, capped per source, ranked.
    pub async fn trending(&self) -> Vec<ContentItem> {
        let per_source = self.config.trending_per_source;
        let futures = self.crawlers.iter().map(|crawler| {
            let crawler = Arc::clone(crawler);
            async move {
                let name = crawler.name().to_string();
                let started = Instant::now();
                let outcome = AssertUnwindSafe(crawler.trending()).catch_unwind().await;
                let mut items = record_outcome(&name, started, outcome);
                items.truncate(per_source);
                items
            }
        });

        let merged: Vec<ContentItem> = join_all(futures).await.into_iter().flatten().collect();
        let results = self.finish(merged, self.config.max_limit).await;
        debug!(results = results.len(), "Aggregated trending");
        results
    }

    async fn finish(&self, merged: Vec<ContentItem>, limit: usize) -> Vec<ContentItem> {
        let total = merged.len();
        let playable: Vec<ContentItem> = merged.into_iter().filter(ContentItem::is_playable).collect();
        if playable.len() < total {
            debug!(dropped = total - playable.len(), "Dropped items without torrents");
        }

        let mut results = deduplicate(playable);
        rank(&mut results);
        results.truncate(limit);
        self.cache.insert_all(&results).await;
        results
    }

    fn crawler_by_name(&self, name: &str) -> Option<&Arc<dyn Crawler>> {
        self.crawlers.iter().find(|c| c.name() == name)
    }
}

/// Turn one crawler outcome into its contribution, logging and counting failures.
fn record_outcome(
    name: &str,
    started: Instant,
    outcome: std::thread::Result<Result<Vec<ContentItem>, CrawlerError>>,
) -> Vec<ContentItem> {
    metrics::CRAWLER_DURATION
        .with_label_values(&[name])
        .observe(started.elapsed().as_secs_f64());

    match outcome {
        Ok(Ok(items)) => {
            metrics::CRAWLER_REQUESTS
                .with_label_values(&[name, "success"])
                .inc();
            metrics::CRAWLER_RESULTS
                .with_label_values(&[name])
                .observe(items.len() as f64);
            items
        }
        Ok(Err(e)) => {
            metrics::CRAWLER_REQUESTS
                .with_label_values(&[name, "error"])
                .inc();
            warn!(source = name, error = %e, "Crawler fetch failed");
            Vec::new()
        }
        Err(_) => {
            metrics::CRAWLER_REQUESTS
                .with_label_values(&[name, "panic"])
                .inc();
            warn!(source = name, "Crawler fetch failed: crawler panicked");
            Vec::new()
        }
    }
}

#[async_trait]
impl ContentResolver for Aggregator {
    async fn resolve(&self, content_id: &str) -> Option<ContentItem> {
        if let Some(item) = self.cache.get(content_id).await {
            return Some(item);
        }

        debug!(content_id = content_id, "Cache miss, re-crawling trending");
        self.trending()
            .await
            .into_iter()
            .find(|item| item.id == content_id)
    }

    async fn resolve_magnet(&self, torrent: &TorrentRef) -> Result<Option<String>, CrawlerError> {
        if let Some(magnet) = &torrent.magnet_uri {
            return Ok(Some(magnet.clone()));
        }
        let Some(details_url) = &torrent.details_url else {
            return Ok(None);
        };
        match self.crawler_by_name(&torrent.source) {
            Some(crawler) => crawler.resolve_magnet(details_url).await,
            None => Ok(None),
        }
    }
}
