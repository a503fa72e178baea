//! YTS JSON API crawler (movies).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::content::{build_magnet, content_id, ContentItem, ContentKind, TorrentRef};

use super::http::fetch_text;
use super::{Crawler, CrawlerError, SearchRequest};

const SOURCE: &str = "yts";
const PAGE_SIZE: u32 = 50;

#[derive(Debug, Deserialize)]
struct ListMoviesResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    data: Option<ListMoviesData>,
}

#[derive(Debug, Deserialize)]
struct ListMoviesData {
    #[serde(default)]
    movies: Option<Vec<YtsMovie>>,
}

#[derive(Debug, Deserialize)]
struct YtsMovie {
    title: String,
    #[serde(default)]
    title_english: Option<String>,
    #[serde(default)]
    year: Option<u16>,
    #[serde(default)]
    rating: Option<f32>,
    #[serde(default)]
    genres: Option<Vec<String>>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    large_cover_image: Option<String>,
    #[serde(default)]
    medium_cover_image: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    torrents: Option<Vec<YtsTorrent>>,
}

#[derive(Debug, Deserialize)]
struct YtsTorrent {
    hash: String,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    size_bytes: Option<u64>,
    #[serde(default)]
    seeds: Option<u32>,
}

/// Crawler for the YTS `list_movies` endpoint.
///
/// The API returns info hashes only, so magnets are built against the
/// public tracker list.
pub struct YtsCrawler {
    client: Client,
    base_url: String,
}

impl YtsCrawler {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_url(&self, request: &SearchRequest) -> String {
        format!(
            "{}/api/v2/list_movies.json?query_term={}&page={}&limit={}&sort_by=download_count",
            self.base_url,
            urlencoding::encode(&request.query),
            request.page,
            PAGE_SIZE
        )
    }
}

#[async_trait]
impl Crawler for YtsCrawler {
    fn name(&self) -> &str {
        SOURCE
    }

    fn kinds(&self) -> &[ContentKind] {
        &[ContentKind::Movie]
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ContentItem>, CrawlerError> {
        let body = fetch_text(&self.client, SOURCE, &self.build_url(request)).await?;
        let items = parse_list_movies(&body)?;
        debug!(source = SOURCE, count = items.len(), "Parsed listing");
        Ok(items)
    }

    async fn trending(&self) -> Result<Vec<ContentItem>, CrawlerError> {
        self.search(&SearchRequest::new("", ContentKind::Movie)).await
    }
}

/// Map a `list_movies.json` body to content items.
pub(crate) fn parse_list_movies(body: &str) -> Result<Vec<ContentItem>, CrawlerError> {
    let response: ListMoviesResponse =
        serde_json::from_str(body).map_err(|e| CrawlerError::parse(SOURCE, e.to_string()))?;

    if response.status.as_deref() == Some("error") {
        return Err(CrawlerError::parse(
            SOURCE,
            response
                .status_message
                .unwrap_or_else(|| "API reported an error".to_string()),
        ));
    }

    let movies = response.data.and_then(|d| d.movies).unwrap_or_default();
    Ok(movies.into_iter().map(movie_to_item).collect())
}

fn movie_to_item(movie: YtsMovie) -> ContentItem {
    let title = movie
        .title_english
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(movie.title);
    let year = movie
        .year
        .filter(|y| *y > 0)
        .unwrap_or_else(|| crate::content::extract_year(&title));

    let source_refs = movie
        .torrents
        .unwrap_or_default()
        .into_iter()
        .map(|t| TorrentRef {
            source: SOURCE.to_string(),
            magnet_uri: Some(build_magnet(&t.hash, &title)),
            info_hash: Some(t.hash.to_ascii_lowercase()),
            quality: t.quality,
            size_bytes: t.size_bytes,
            seeder_count: t.seeds,
            details_url: None,
        })
        .collect();

    ContentItem {
        id: content_id(SOURCE, &title, year),
        title,
        year,
        rating_score: movie.rating,
        genres: movie.genres.unwrap_or_default(),
        kind: ContentKind::Movie,
        source_refs,
        source: SOURCE.to_string(),
        poster: movie.large_cover_image.or(movie.medium_cover_image),
        summary: movie.summary.filter(|s| !s.is_empty()),
        language: movie.language,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "status": "ok",
        "data": {
            "movie_count": 2,
            "movies": [
                {
                    "id": 1,
                    "title": "The Avengers",
                    "title_english": "The Avengers",
                    "year": 2012,
                    "rating": 8.0,
                    "genres": ["Action", "Sci-Fi"],
                    "language": "en",
                    "large_cover_image": "https://img/large.jpg",
                    "summary": "Heroes assemble.",
                    "torrents": [
                        {"hash": "AAAA1111", "quality": "720p", "size_bytes": 1000, "seeds": 40},
                        {"hash": "BBBB2222", "quality": "1080p", "size_bytes": 2000, "seeds": 90}
                    ]
                },
                {
                    "id": 2,
                    "title": "Nameless",
                    "year": 0
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_list_movies() {
        let items = parse_list_movies(BODY).unwrap();
        assert_eq!(items.len(), 2);

        let avengers = &items[0];
        assert_eq!(avengers.title, "The Avengers");
        assert_eq!(avengers.year, 2012);
        assert_eq!(avengers.kind, ContentKind::Movie);
        assert_eq!(avengers.source_refs.len(), 2);
        assert_eq!(avengers.seeder_count(), 90);
        assert_eq!(avengers.poster.as_deref(), Some("https://img/large.jpg"));

        let hd = &avengers.source_refs[1];
        assert_eq!(hd.info_hash.as_deref(), Some("bbbb2222"));
        assert!(hd
            .magnet_uri
            .as_deref()
            .unwrap()
            .starts_with("magnet:?xt=urn:btih:bbbb2222"));

        // Missing torrents map to an empty ref list; year 0 falls back.
        assert!(items[1].source_refs.is_empty());
        assert!(items[1].year >= 2024);
    }

    #[test]
    fn test_parse_empty_and_null_movies() {
        assert!(parse_list_movies(r#"{"status":"ok","data":{"movie_count":0}}"#)
            .unwrap()
            .is_empty());
        assert!(parse_list_movies(r#"{"status":"ok","data":{"movies":null}}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_parse_error_status() {
        let err = parse_list_movies(r#"{"status":"error","status_message":"bad"}"#).unwrap_err();
        assert!(matches!(err, CrawlerError::Parse { .. }));
        assert!(parse_list_movies("<html>").is_err());
    }

    #[test]
    fn test_build_url_encodes_query() {
        let crawler = YtsCrawler::new(Client::new(), "https://yts.example/");
        let url = crawler.build_url(&SearchRequest::new("the matrix", ContentKind::Movie).with_page(2));
        assert_eq!(
            url,
            "https://yts.example/api/v2/list_movies.json?query_term=the%20matrix&page=2&limit=50&sort_by=download_count"
        );
    }
}
