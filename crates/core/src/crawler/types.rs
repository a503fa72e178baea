//! Crawler trait, request and error types.

use async_trait::async_trait;
use thiserror::Error;

use crate::content::{ContentItem, ContentKind};

/// One crawler query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Free-text query. Empty means "whatever the source lists first".
    pub query: String,
    pub kind: ContentKind,
    /// 1-based result page.
    pub page: u32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            query: query.into(),
            kind,
            page: 1,
        }
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }
}

/// Errors from a single upstream source.
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    #[error("Connection to {source_name} failed: {message}")]
    ConnectionFailed { source_name: String, message: String },

    #[error("{source_name} returned HTTP {status}")]
    HttpStatus { source_name: String, status: u16 },

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Failed to parse {source_name} response: {message}")]
    Parse { source_name: String, message: String },
}

impl CrawlerError {
    pub fn parse(source_name: &str, message: impl Into<String>) -> Self {
        CrawlerError::Parse {
            source_name: source_name.to_string(),
            message: message.into(),
        }
    }
}

/// An adapter over one upstream torrent index.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Source name, also used as the id prefix of produced items.
    fn name(&self) -> &str;

    /// Content kinds this source serves.
    fn kinds(&self) -> &[ContentKind];

    /// Search the source.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<ContentItem>, CrawlerError>;

    /// Items the source lists without a query. Sources with no useful
    /// default listing contribute nothing.
    async fn trending(&self) -> Result<Vec<ContentItem>, CrawlerError> {
        Ok(Vec::new())
    }

    /// Resolve a magnet URI from a detail page produced by this source.
    async fn resolve_magnet(&self, _details_url: &str) -> Result<Option<String>, CrawlerError> {
        Ok(None)
    }
}
