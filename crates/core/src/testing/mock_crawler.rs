//! Mock crawler for testing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::content::{ContentItem, ContentKind};
use crate::crawler::{Crawler, CrawlerError, SearchRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Normal,
    Fail,
    Panic,
}

/// Mock implementation of the Crawler trait.
///
/// Returns canned results for every search, records each request, and can
/// be told to fail or panic to exercise fault isolation.
///
/// # Example
///
/// ```rust,ignore
/// let crawler = MockCrawler::new("yts", &[ContentKind::Movie])
///     .with_results(vec![fixtures::movie("yts", "Heat", 1995, 12)]);
///
/// aggregator.search_all("heat", KindFilter::Movie, 1, None).await;
/// assert_eq!(crawler.recorded_requests().await.len(), 1);
/// ```
#[derive(Debug)]
pub struct MockCrawler {
    name: String,
    kinds: Vec<ContentKind>,
    results: Vec<ContentItem>,
    trending: Vec<ContentItem>,
    magnet: Option<String>,
    behavior: Behavior,
    delay: Option<Duration>,
    requests: Arc<RwLock<Vec<SearchRequest>>>,
}

impl MockCrawler {
    pub fn new(name: impl Into<String>, kinds: &[ContentKind]) -> Self {
        Self {
            name: name.into(),
            kinds: kinds.to_vec(),
            results: Vec::new(),
            trending: Vec::new(),
            magnet: None,
            behavior: Behavior::Normal,
            delay: None,
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Items returned by every search.
    pub fn with_results(mut self, results: Vec<ContentItem>) -> Self {
        self.results = results;
        self
    }

    /// Items returned by `trending`.
    pub fn with_trending(mut self, trending: Vec<ContentItem>) -> Self {
        self.trending = trending;
        self
    }

    /// Magnet returned for any detail page.
    pub fn with_magnet(mut self, magnet: impl Into<String>) -> Self {
        self.magnet = Some(magnet.into());
        self
    }

    /// Every call fails with a connection error.
    pub fn with_failure(mut self) -> Self {
        self.behavior = Behavior::Fail;
        self
    }

    /// Every call panics.
    pub fn with_panic(mut self) -> Self {
        self.behavior = Behavior::Panic;
        self
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Search requests received so far, in call order.
    pub async fn recorded_requests(&self) -> Vec<SearchRequest> {
        self.requests.read().await.clone()
    }

    async fn respond(&self, items: &[ContentItem]) -> Result<Vec<ContentItem>, CrawlerError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.behavior {
            Behavior::Normal => Ok(items.to_vec()),
            Behavior::Fail => Err(CrawlerError::ConnectionFailed {
                source_name: self.name.clone(),
                message: "mock failure".to_string(),
            }),
            Behavior::Panic => panic!("mock crawler {} panicked", self.name),
        }
    }
}

#[async_trait]
impl Crawler for MockCrawler {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> &[ContentKind] {
        &self.kinds
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ContentItem>, CrawlerError> {
        self.requests.write().await.push(request.clone());
        self.respond(&self.results).await
    }

    async fn trending(&self) -> Result<Vec<ContentItem>, CrawlerError> {
        self.respond(&self.trending).await
    }

    async fn resolve_magnet(&self, _details_url: &str) -> Result<Option<String>, CrawlerError> {
        self.respond(&[]).await?;
        Ok(self.magnet.clone())
    }
}
