//! Types for normalized search results.

use serde::{Deserialize, Serialize};

/// What a content item is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Movie,
    Tv,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Movie => "movie",
            ContentKind::Tv => "tv",
        }
    }
}

/// Kind filter accepted by searches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum KindFilter {
    #[default]
    Movie,
    Tv,
    All,
}

impl KindFilter {
    /// Concrete kinds this filter expands to, in fan-out order.
    pub fn kinds(&self) -> &'static [ContentKind] {
        match self {
            KindFilter::Movie => &[ContentKind::Movie],
            KindFilter::Tv => &[ContentKind::Tv],
            KindFilter::All => &[ContentKind::Movie, ContentKind::Tv],
        }
    }

    /// Lenient parse for query strings; unknown values fall back to `All`.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "movie" | "movies" => KindFilter::Movie,
            "tv" | "show" | "shows" | "series" => KindFilter::Tv,
            _ => KindFilter::All,
        }
    }
}

/// One retrievable swarm source for a content item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TorrentRef {
    /// Crawler that produced this reference.
    pub source: String,
    /// Canonical swarm locator. Absent for listings that only link a detail page.
    #[serde(rename = "magnet", default, skip_serializing_if = "Option::is_none")]
    pub magnet_uri: Option<String>,
    /// Info hash (lowercase hex), when known.
    #[serde(rename = "hash", default, skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    #[serde(rename = "size", default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(rename = "seeders", default, skip_serializing_if = "Option::is_none")]
    pub seeder_count: Option<u32>,
    /// Page the magnet can be resolved from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_url: Option<String>,
}

impl TorrentRef {
    /// Seeder count with absent treated as 0.
    pub fn seeders(&self) -> u32 {
        self.seeder_count.unwrap_or(0)
    }

    /// Whether two refs point at the same swarm.
    pub fn same_swarm(&self, other: &TorrentRef) -> bool {
        match (&self.info_hash, &other.info_hash) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => match (&self.magnet_uri, &other.magnet_uri) {
                (Some(a), Some(b)) => a == b,
                _ => self.details_url.is_some() && self.details_url == other.details_url,
            },
        }
    }
}

/// A normalized search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: String,
    pub title: String,
    pub year: u16,
    #[serde(rename = "rating", default, skip_serializing_if = "Option::is_none")]
    pub rating_score: Option<f32>,
    pub genres: Vec<String>,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(rename = "torrents")]
    pub source_refs: Vec<TorrentRef>,
    /// Crawler that produced the item.
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl ContentItem {
    /// Best seeder count across all refs (absent counts as 0).
    pub fn seeder_count(&self) -> u32 {
        self.source_refs
            .iter()
            .map(TorrentRef::seeders)
            .max()
            .unwrap_or(0)
    }

    /// Whether the item can be streamed at all.
    pub fn is_playable(&self) -> bool {
        !self.source_refs.is_empty()
    }

    /// Pick the ref to stream: exact "1080p", else "720p", else the first.
    pub fn best_ref(&self) -> Option<&TorrentRef> {
        let by_quality = |label: &str| {
            self.source_refs
                .iter()
                .find(|r| r.quality.as_deref() == Some(label))
        };
        by_quality("1080p")
            .or_else(|| by_quality("720p"))
            .or_else(|| self.source_refs.first())
    }
}
