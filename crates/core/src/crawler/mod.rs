//! Source crawlers.
//!
//! One adapter per upstream index, each behind the [`Crawler`] trait so a
//! markup change or an offline source stays contained in one file. Errors are
//! returned to the caller; the aggregator is the layer that turns them into
//! empty contributions.

mod eztv;
mod http;
mod types;
mod x1337;
mod yts;

pub use eztv::EztvCrawler;
pub use http::build_client;
pub use types::*;
pub use x1337::X1337Crawler;
pub use yts::YtsCrawler;

use std::sync::Arc;

use crate::config::CrawlersConfig;

/// Build every enabled crawler from configuration.
pub fn build_crawlers(config: &CrawlersConfig) -> Result<Vec<Arc<dyn Crawler>>, CrawlerError> {
    let client = build_client(config)?;
    let mut crawlers: Vec<Arc<dyn Crawler>> = Vec::new();

    if config.yts.enabled {
        crawlers.push(Arc::new(YtsCrawler::new(client.clone(), &config.yts.base_url)));
    }
    if config.x1337.enabled {
        crawlers.push(Arc::new(X1337Crawler::new(
            client.clone(),
            &config.x1337.base_url,
            config.max_rows,
        )));
    }
    if config.eztv.enabled {
        crawlers.push(Arc::new(EztvCrawler::new(
            client,
            &config.eztv.base_url,
            config.max_rows,
        )));
    }

    Ok(crawlers)
}
