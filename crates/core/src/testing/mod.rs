//! Testing utilities and mock implementations.
//!
//! Mocks stand in for every external collaborator (upstream indexes, the
//! swarm engine, the transcoder and the companion stream tool) so the
//! aggregation and session paths can be exercised without network access or
//! child processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use swarmcast_core::testing::{fixtures, MockCrawler, MockSwarmEngine, MockTranscoder};
//!
//! let crawler = MockCrawler::new("yts", &[ContentKind::Movie])
//!     .with_results(vec![fixtures::movie("yts", "Heat", 1995, 40)]);
//! let engine = MockSwarmEngine::new().with_files(fixtures::movie_files());
//! let transcoder = MockTranscoder::new().with_chunks(vec![b"ftyp".to_vec()]);
//! ```

mod mock_crawler;
mod mock_stream_tool;
mod mock_swarm;
mod mock_transcoder;

pub use mock_crawler::MockCrawler;
pub use mock_stream_tool::MockStreamTool;
pub use mock_swarm::{MockSwarmEngine, MockSwarmHandle};
pub use mock_transcoder::{MockTranscodeProcess, MockTranscoder};

/// Test fixtures and helper functions.
pub mod fixtures {
    use sha2::{Digest, Sha256};

    use crate::content::{build_magnet, content_id, ContentItem, ContentKind, TorrentRef};
    use crate::swarm::SwarmFile;

    /// Deterministic 40-hex-char info hash for a source/title pair.
    pub fn info_hash(source: &str, title: &str) -> String {
        let digest = Sha256::digest(format!("{}|{}", source, title).as_bytes());
        digest.iter().take(20).map(|b| format!("{:02x}", b)).collect()
    }

    /// A 1080p torrent ref with a magnet.
    pub fn torrent(source: &str, title: &str, seeders: u32) -> TorrentRef {
        let hash = info_hash(source, title);
        TorrentRef {
            source: source.to_string(),
            magnet_uri: Some(build_magnet(&hash, title)),
            info_hash: Some(hash),
            quality: Some("1080p".to_string()),
            size_bytes: Some(1536 * 1024 * 1024), // 1.5 GiB
            seeder_count: Some(seeders),
            details_url: None,
        }
    }

    /// A movie item with one torrent ref.
    pub fn movie(source: &str, title: &str, year: u16, seeders: u32) -> ContentItem {
        ContentItem {
            id: content_id(source, title, year),
            title: title.to_string(),
            year,
            rating_score: None,
            genres: vec!["General".to_string()],
            kind: ContentKind::Movie,
            source_refs: vec![torrent(source, title, seeders)],
            source: source.to_string(),
            poster: None,
            summary: None,
            language: None,
        }
    }

    /// A TV item with one torrent ref.
    pub fn show(source: &str, title: &str, year: u16, seeders: u32) -> ContentItem {
        let mut item = movie(source, title, year, seeders);
        item.kind = ContentKind::Tv;
        item.genres = vec!["TV".to_string()];
        item
    }

    /// Typical movie torrent layout: the feature, a sample and extras.
    pub fn movie_files() -> Vec<SwarmFile> {
        vec![
            swarm_file(0, "Movie.2021.1080p/movie.nfo", 4 * 1024),
            swarm_file(1, "Movie.2021.1080p/Sample/sample.mkv", 40 * 1024 * 1024),
            swarm_file(2, "Movie.2021.1080p/Movie.2021.1080p.mkv", 2 * 1024 * 1024 * 1024),
        ]
    }

    pub fn swarm_file(index: usize, path: &str, size_bytes: u64) -> SwarmFile {
        SwarmFile {
            index,
            path: path.to_string(),
            size_bytes,
        }
    }
}
