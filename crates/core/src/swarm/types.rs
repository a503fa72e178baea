//! Swarm traits and types.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::io::AsyncRead;

/// One file inside a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmFile {
    /// Index within the torrent's file list.
    pub index: usize,
    /// Path relative to the torrent root.
    pub path: String,
    pub size_bytes: u64,
}

/// Transfer rates in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Throughput {
    pub download_bytes_per_sec: u64,
    pub upload_bytes_per_sec: u64,
}

impl std::ops::Add for Throughput {
    type Output = Throughput;

    fn add(self, other: Throughput) -> Throughput {
        Throughput {
            download_bytes_per_sec: self.download_bytes_per_sec + other.download_bytes_per_sec,
            upload_bytes_per_sec: self.upload_bytes_per_sec + other.upload_bytes_per_sec,
        }
    }
}

/// Reader over a torrent file. Reads of pieces not yet downloaded wait for them.
pub type SwarmReader = Pin<Box<dyn AsyncRead + Send>>;

/// Errors from the swarm engine.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error("Swarm engine initialization failed: {0}")]
    Init(String),

    #[error("Invalid magnet URI: {0}")]
    InvalidMagnet(String),

    #[error("Swarm unreachable: {0}")]
    Unreachable(String),

    #[error("Torrent has no files")]
    NoFiles,

    #[error("File index {0} out of range")]
    FileNotFound(usize),

    #[error("Swarm handle already destroyed")]
    Destroyed,

    #[error("Swarm engine error: {0}")]
    Engine(String),
}

/// A joined torrent.
#[async_trait]
pub trait SwarmHandle: Send + Sync {
    /// Info hash (lowercase hex).
    fn info_hash(&self) -> String;

    /// Wait until metadata is known and return the file list.
    async fn wait_metadata(&self) -> Result<Vec<SwarmFile>, SwarmError>;

    /// Open a reader over one file, starting at `start_byte`.
    async fn open_reader(&self, file_index: usize, start_byte: u64)
        -> Result<SwarmReader, SwarmError>;

    /// Download progress in `0.0..=1.0`.
    fn progress(&self) -> f64;

    fn throughput(&self) -> Throughput;

    /// Drop peer connections and on-disk fragments. Safe to call repeatedly.
    async fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

/// The process-wide swarm client.
#[async_trait]
pub trait SwarmEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &str;

    /// Join the swarm behind a magnet URI.
    ///
    /// Callers bound this with their own timeout.
    async fn join(&self, magnet_uri: &str) -> Result<Arc<dyn SwarmHandle>, SwarmError>;

    /// Sum of current rates across all torrents.
    fn aggregate_throughput(&self) -> Throughput;

    /// Stop the engine. Further joins fail.
    async fn shutdown(&self);
}
