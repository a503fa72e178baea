use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::transcode::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub crawlers: CrawlersConfig,
    #[serde(default)]
    pub swarm: SwarmConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    3000
}

/// Aggregated search behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Result cap when the caller does not pass one.
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    /// Hard upper bound on caller-provided limits.
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
    /// How long search results stay resolvable by id.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Items taken from each source for the trending listing.
    #[serde(default = "default_trending_per_source")]
    pub trending_per_source: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            cache_ttl_secs: default_cache_ttl(),
            cache_capacity: default_cache_capacity(),
            trending_per_source: default_trending_per_source(),
        }
    }
}

fn default_limit() -> usize {
    50
}

fn default_max_limit() -> usize {
    200
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_trending_per_source() -> usize {
    20
}

/// Upstream index crawlers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlersConfig {
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_crawler_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum listing rows taken from one scraped page.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_yts")]
    pub yts: SourceConfig,
    #[serde(default = "default_x1337")]
    pub x1337: SourceConfig,
    #[serde(default = "default_eztv")]
    pub eztv: SourceConfig,
}

impl Default for CrawlersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_crawler_timeout(),
            user_agent: default_user_agent(),
            max_rows: default_max_rows(),
            yts: default_yts(),
            x1337: default_x1337(),
            eztv: default_eztv(),
        }
    }
}

/// One upstream source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub base_url: String,
}

fn default_crawler_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string()
}

fn default_max_rows() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_yts() -> SourceConfig {
    SourceConfig {
        enabled: true,
        base_url: "https://yts.mx".to_string(),
    }
}

fn default_x1337() -> SourceConfig {
    SourceConfig {
        enabled: true,
        base_url: "https://1337x.to".to_string(),
    }
}

fn default_eztv() -> SourceConfig {
    SourceConfig {
        enabled: true,
        base_url: "https://eztv.re".to_string(),
    }
}

/// Embedded swarm engine (librqbit) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwarmConfig {
    /// Scratch directory for in-progress pieces. Removed per torrent on teardown.
    #[serde(default = "default_download_path")]
    pub download_path: PathBuf,
    #[serde(default = "default_true")]
    pub enable_dht: bool,
    #[serde(default)]
    pub listen_port: Option<u16>,
    /// Upper bound for joining a swarm and receiving its metadata.
    #[serde(default = "default_join_timeout")]
    pub join_timeout_secs: u64,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            download_path: default_download_path(),
            enable_dht: true,
            listen_port: None,
            join_timeout_secs: default_join_timeout(),
        }
    }
}

fn default_download_path() -> PathBuf {
    std::env::temp_dir().join("swarmcast")
}

fn default_join_timeout() -> u64 {
    30
}

/// External player companion (streamlink) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default = "default_streamlink_path")]
    pub streamlink_path: PathBuf,
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Host used when building the local URL handed back to clients.
    #[serde(default = "default_player_host")]
    pub host: String,
    #[serde(default = "default_port_range_start")]
    pub port_range_start: u16,
    /// Concurrent companion streams; also the size of the port range.
    #[serde(default = "default_max_streams")]
    pub max_streams: u16,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            streamlink_path: default_streamlink_path(),
            quality: default_quality(),
            host: default_player_host(),
            port_range_start: default_port_range_start(),
            max_streams: default_max_streams(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_streamlink_path() -> PathBuf {
    PathBuf::from("streamlink")
}

fn default_quality() -> String {
    "best".to_string()
}

fn default_player_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port_range_start() -> u16 {
    8090
}

fn default_max_streams() -> u16 {
    8
}

fn default_probe_timeout() -> u64 {
    20
}
