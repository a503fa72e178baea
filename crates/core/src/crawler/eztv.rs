//! EZTV HTML crawler (TV).
//!
//! The listing exposes magnet anchors directly, so no detail hop is needed.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::debug;

use crate::content::{
    content_id, extract_genres, extract_quality, extract_year, info_hash_from_magnet, parse_size,
    ContentItem, ContentKind, TorrentRef,
};

use super::http::{fetch_text, join_url, parse_count};
use super::{Crawler, CrawlerError, SearchRequest};

const SOURCE: &str = "eztv";

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr.forum_header_border").unwrap());
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td.forum_thread_post a").unwrap());
static MAGNET_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="magnet:"]"#).unwrap());
static SIZE: Lazy<Selector> = Lazy::new(|| Selector::parse("td:nth-child(4)").unwrap());
static SEEDS: Lazy<Selector> = Lazy::new(|| Selector::parse("td:nth-child(6)").unwrap());

/// Crawler for EZTV search pages.
pub struct EztvCrawler {
    client: Client,
    base_url: String,
    max_rows: usize,
}

impl EztvCrawler {
    pub fn new(client: Client, base_url: &str, max_rows: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_rows,
        }
    }

    fn build_url(&self, request: &SearchRequest) -> String {
        let slug = request
            .query
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("{}/search/{}", self.base_url, urlencoding::encode(&slug))
    }
}

#[async_trait]
impl Crawler for EztvCrawler {
    fn name(&self) -> &str {
        SOURCE
    }

    fn kinds(&self) -> &[ContentKind] {
        &[ContentKind::Tv]
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ContentItem>, CrawlerError> {
        let body = fetch_text(&self.client, SOURCE, &self.build_url(request)).await?;
        let items = parse_listing(&body, &self.base_url, self.max_rows);
        debug!(source = SOURCE, count = items.len(), "Parsed listing");
        Ok(items)
    }

    async fn trending(&self) -> Result<Vec<ContentItem>, CrawlerError> {
        self.search(&SearchRequest::new("", ContentKind::Tv)).await
    }
}

/// Extract items from a listing. Rows without a magnet or seeders are dropped.
pub(crate) fn parse_listing(body: &str, base_url: &str, max_rows: usize) -> Vec<ContentItem> {
    let document = Html::parse_document(body);
    let mut items = Vec::new();

    for row in document.select(&ROW).take(max_rows) {
        // The first cell links the show with an image; the episode link has text.
        let Some(link) = row.select(&TITLE_LINK).find(|a| {
            let href = a.value().attr("href").unwrap_or_default();
            !href.starts_with("magnet:") && !a.text().collect::<String>().trim().is_empty()
        }) else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();

        let Some(magnet) = row
            .select(&MAGNET_LINK)
            .filter_map(|a| a.value().attr("href"))
            .next()
            .map(str::to_string)
        else {
            continue;
        };

        let seeders = row
            .select(&SEEDS)
            .next()
            .map(|cell| parse_count(&cell.text().collect::<String>()))
            .unwrap_or(0);
        if seeders == 0 {
            continue;
        }

        let size_bytes = row
            .select(&SIZE)
            .next()
            .and_then(|cell| parse_size(&cell.text().collect::<String>()));

        let year = extract_year(&title);
        let mut genres = extract_genres(&title);
        if genres == ["General"] {
            genres = vec!["TV".to_string()];
        }

        items.push(ContentItem {
            id: content_id(SOURCE, &title, year),
            year,
            rating_score: None,
            genres,
            kind: ContentKind::Tv,
            source_refs: vec![TorrentRef {
                source: SOURCE.to_string(),
                info_hash: info_hash_from_magnet(&magnet),
                magnet_uri: Some(magnet),
                quality: extract_quality(&title),
                size_bytes,
                seeder_count: Some(seeders),
                details_url: link.value().attr("href").map(|h| join_url(base_url, h)),
            }],
            source: SOURCE.to_string(),
            poster: None,
            summary: None,
            language: None,
            title,
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body><table>
        <tr name="hover" class="forum_header_border">
          <td class="forum_thread_post"><a href="/shows/1/breaking-bad/"><img src="x.png"></a></td>
          <td class="forum_thread_post"><a href="/ep/10/breaking-bad-s05e14/" class="epinfo">Breaking Bad S05E14 720p HDTV</a></td>
          <td class="forum_thread_post"><a href="magnet:?xt=urn:btih:DEADBEEF&dn=bb" class="magnet"></a></td>
          <td class="forum_thread_post">1.2 GB</td>
          <td class="forum_thread_post">1 week</td>
          <td class="forum_thread_post_end"><font color="green">1,530</font></td>
        </tr>
        <tr name="hover" class="forum_header_border">
          <td class="forum_thread_post"><a href="/shows/2/"><img src="y.png"></a></td>
          <td class="forum_thread_post"><a href="/ep/11/" class="epinfo">No Magnet S01E01</a></td>
          <td class="forum_thread_post"></td>
          <td class="forum_thread_post">300 MB</td>
          <td class="forum_thread_post">1 day</td>
          <td class="forum_thread_post_end">40</td>
        </tr>
        <tr name="hover" class="forum_header_border">
          <td class="forum_thread_post"><a href="/shows/3/"><img src="z.png"></a></td>
          <td class="forum_thread_post"><a href="/ep/12/" class="epinfo">Dead Show S02E02</a></td>
          <td class="forum_thread_post"><a href="magnet:?xt=urn:btih:CAFE&dn=d" class="magnet"></a></td>
          <td class="forum_thread_post">300 MB</td>
          <td class="forum_thread_post">1 day</td>
          <td class="forum_thread_post_end">-</td>
        </tr>
        </table></body></html>
    "#;

    #[test]
    fn test_parse_listing() {
        let items = parse_listing(LISTING, "https://eztv.example", 20);
        assert_eq!(items.len(), 1);

        let episode = &items[0];
        assert_eq!(episode.title, "Breaking Bad S05E14 720p HDTV");
        assert_eq!(episode.kind, ContentKind::Tv);
        assert_eq!(episode.genres, vec!["TV"]);

        let torrent = &episode.source_refs[0];
        assert_eq!(torrent.seeder_count, Some(1530));
        assert_eq!(torrent.info_hash.as_deref(), Some("deadbeef"));
        assert_eq!(torrent.quality.as_deref(), Some("720p"));
        assert_eq!(torrent.size_bytes, Some(1_288_490_189));
        assert_eq!(
            torrent.details_url.as_deref(),
            Some("https://eztv.example/ep/10/breaking-bad-s05e14/")
        );
    }

    #[test]
    fn test_build_url_slugifies_query() {
        let crawler = EztvCrawler::new(Client::new(), "https://eztv.example/", 20);
        assert_eq!(
            crawler.build_url(&SearchRequest::new("breaking  bad", ContentKind::Tv)),
            "https://eztv.example/search/breaking-bad"
        );
        assert_eq!(
            crawler.build_url(&SearchRequest::new("", ContentKind::Tv)),
            "https://eztv.example/search/"
        );
    }
}
