//! 1337x HTML crawler (movies and TV).
//!
//! Search listings only carry a detail-page link per row; the magnet lives on
//! the detail page and is fetched lazily through [`Crawler::resolve_magnet`].

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

const SOURCE: &str = "1337x";

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse(".table-list tbody tr").unwrap());
static TITLE_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"td.name a[href^="/torrent/"]"#).unwrap());
static SEEDS: Lazy<Selector> = Lazy::new(|| Selector::parse("td.seeds").unwrap());
static SIZE: Lazy<Selector> = Lazy::new(|| Selector::parse("td.size").unwrap());
static MAGNET_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href^="magnet:"]"#).unwrap());

/// Crawler for the 1337x category search pages.
pub struct X1337Crawler {
    client: Client,
    base_url: String,
    max_rows: usize,
}

impl X1337Crawler {
    pub fn new(client: Client, base_url: &str, max_rows: usize) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_rows,
        }
    }

    fn build_url(&self, request: &SearchRequest) -> String {
        let category = match request.kind {
            ContentKind::Movie => "Movies",
            ContentKind::Tv => "TV",
        };
        format!(
            "{}/category-search/{}/{}/{}/",
            self.base_url,
            urlencoding::encode(request.query.trim()),
            category,
            request.page
        )
    }
}

#[async_trait]
impl Crawler for X1337Crawler {
    fn name(&self) -> &str {
        SOURCE
    }

    fn kinds(&self) -> &[ContentKind] {
        &[ContentKind::Movie, ContentKind::Tv]
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<ContentItem>, CrawlerError> {
        // The site rejects empty category searches.
        if request.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let body = fetch_text(&self.client, SOURCE, &self.build_url(request)).await?;
        let items = parse_listing(&body, &self.base_url, request.kind, self.max_rows);
        debug!(source = SOURCE, count = items.len(), "Parsed listing");
        Ok(items)
    }

    async fn resolve_magnet(&self, details_url: &str) -> Result<Option<String>, CrawlerError> {
        let url = join_url(&self.base_url, details_url);
        let body = fetch_text(&self.client, SOURCE, &url).await?;
        Ok(parse_detail_magnet(&body))
    }
}

/// Extract items from a search listing. Rows with zero seeders are dropped.
pub(crate) fn parse_listing(
    body: &str,
    base_url: &str,
    kind: ContentKind,
    max_rows: usize,
) -> Vec<ContentItem> {
    let document = Html::parse_document(body);
    let mut items = Vec::new();

    for row in document.select(&ROW).take(max_rows) {
        let Some(link) = row.select(&TITLE_LINK).next() else {
            continue;
        };
        let title = link.text().collect::<String>().trim().to_string();
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if title.is_empty() {
            continue;
        }

        let seeders = row
            .select(&SEEDS)
            .next()
            .map(|cell| parse_count(&cell.text().collect::<String>()))
            .unwrap_or(0);
        if seeders == 0 {
            continue;
        }

        // The size cell also nests the uploader; its first text node is the size.
        let size_bytes = row
            .select(&SIZE)
            .next()
            .and_then(|cell| cell.text().next())
            .and_then(parse_size);

        let year = extract_year(&title);
        items.push(ContentItem {
            id: content_id(SOURCE, &title, year),
            year,
            rating_score: None,
            genres: extract_genres(&title),
            kind,
            source_refs: vec![TorrentRef {
                source: SOURCE.to_string(),
                magnet_uri: None,
                info_hash: None,
                quality: extract_quality(&title),
                size_bytes,
                seeder_count: Some(seeders),
                details_url: Some(join_url(base_url, href)),
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

/// First magnet anchor on a detail page.
pub(crate) fn parse_detail_magnet(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    document
        .select(&MAGNET_LINK)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| info_hash_from_magnet(href).is_some())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
        <table class="table-list">
          <thead><tr><th>name</th><th>se</th><th>size</th></tr></thead>
          <tbody>
            <tr>
              <td class="coll-1 name">
                <a href="/sub/42/0/" class="icon"><i class="flaticon-hd"></i></a>
                <a href="/torrent/1001/The-Avengers-2012-1080p/">The Avengers 2012 1080p BluRay</a>
              </td>
              <td class="coll-2 seeds">1,204</td>
              <td class="coll-3 leeches">50</td>
              <td class="coll-4 size mob-uploader">1.5 GB<span class="seeds">1204</span></td>
            </tr>
            <tr>
              <td class="coll-1 name">
                <a href="/torrent/1002/Dead-Swarm/">Dead Swarm 2010 720p</a>
              </td>
              <td class="coll-2 seeds">0</td>
              <td class="coll-4 size">700 MB</td>
            </tr>
            <tr>
              <td class="coll-1 name">
                <a href="/torrent/1003/Horror-Night/">Horror Night 720p</a>
              </td>
              <td class="coll-2 seeds">7</td>
              <td class="coll-4 size">700 MB</td>
            </tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_listing_excludes_zero_seeders() {
        let items = parse_listing(LISTING, "https://1337x.example", ContentKind::Movie, 20);
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.seeder_count() > 0));

        let avengers = &items[0];
        assert_eq!(avengers.title, "The Avengers 2012 1080p BluRay");
        assert_eq!(avengers.year, 2012);
        assert_eq!(avengers.genres, vec!["Action"]);
        let torrent = &avengers.source_refs[0];
        assert_eq!(torrent.seeder_count, Some(1204));
        assert_eq!(torrent.quality.as_deref(), Some("1080p"));
        assert_eq!(torrent.size_bytes, Some(1_610_612_736));
        assert!(torrent.magnet_uri.is_none());
        assert_eq!(
            torrent.details_url.as_deref(),
            Some("https://1337x.example/torrent/1001/The-Avengers-2012-1080p/")
        );

        assert_eq!(items[1].genres, vec!["Horror"]);
    }

    #[test]
    fn test_parse_listing_respects_max_rows() {
        let items = parse_listing(LISTING, "https://1337x.example", ContentKind::Tv, 1);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, ContentKind::Tv);
    }

    #[test]
    fn test_parse_listing_garbage_is_empty() {
        assert!(parse_listing("not html at all", "https://x", ContentKind::Movie, 20).is_empty());
    }

    #[test]
    fn test_parse_detail_magnet() {
        let page = r#"<div><a href="magnet:?xt=urn:btih:ABC123&dn=x">Magnet Download</a></div>"#;
        assert_eq!(
            parse_detail_magnet(page).as_deref(),
            Some("magnet:?xt=urn:btih:ABC123&dn=x")
        );
        assert_eq!(parse_detail_magnet("<a href=\"/nothing\">x</a>"), None);
    }

    #[test]
    fn test_build_url_per_kind() {
        let crawler = X1337Crawler::new(Client::new(), "https://1337x.example", 20);
        assert_eq!(
            crawler.build_url(&SearchRequest::new("the office", ContentKind::Tv)),
            "https://1337x.example/category-search/the%20office/TV/1/"
        );
        assert_eq!(
            crawler.build_url(&SearchRequest::new("matrix", ContentKind::Movie).with_page(3)),
            "https://1337x.example/category-search/matrix/Movies/3/"
        );
    }
}
