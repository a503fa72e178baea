pub mod aggregator;
pub mod config;
pub mod content;
pub mod crawler;
pub mod metrics;
pub mod player;
pub mod process;
pub mod session;
pub mod swarm;
pub mod testing;
pub mod transcode;

pub use aggregator::{Aggregator, ContentResolver};
pub use config::{
    load_config, load_config_from_env, load_config_from_str, validate_config, Config, ConfigError,
};
pub use content::{ContentItem, ContentKind, KindFilter, TorrentRef};
pub use crawler::{build_crawlers, Crawler, CrawlerError, SearchRequest};
pub use player::{CompanionStream, PlayerError, StreamTool, StreamlinkTool};
pub use session::{EndReason, SessionError, SessionManager, SessionSnapshot, SessionState};
pub use swarm::{LibrqbitEngine, SwarmEngine, SwarmError, SwarmHandle};
pub use transcode::{FfmpegTranscoder, TranscodeError, Transcoder};
