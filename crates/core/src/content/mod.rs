//! Normalized content model shared by crawlers, the aggregator and sessions.
//!
//! Every upstream index maps its results into [`ContentItem`]s carrying one
//! or more [`TorrentRef`]s. Identifiers are derived from the normalized
//! title, the year and the producing source, so repeated crawls of the same
//! listing converge on the same id.

mod cache;
mod magnet;
mod title;
mod types;

pub use cache::ContentCache;
pub use magnet::{build_magnet, info_hash_from_magnet, PUBLIC_TRACKERS};
pub use title::{
    content_id, extract_genres, extract_quality, extract_year, normalize_title, parse_size,
};
pub use types::*;
