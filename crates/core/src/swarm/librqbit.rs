//! librqbit embedded swarm engine.

use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use librqbit::{
    AddTorrent as RqbitAddTorrent, AddTorrentOptions, AddTorrentResponse, ManagedTorrent, Session,
    SessionOptions,
};
use tokio::io::AsyncSeekExt;
use tracing::{debug, info, warn};

use crate::config::SwarmConfig;
use crate::metrics;

use super::{SwarmEngine, SwarmError, SwarmFile, SwarmHandle, SwarmReader, Throughput};

/// Handles alive per info-hash.
///
/// Sessions streaming the same content share one managed torrent; only the
/// release of the last handle may delete it.
#[derive(Debug, Default)]
pub struct TorrentRefs {
    counts: Mutex<HashMap<String, usize>>,
}

impl TorrentRefs {
    pub fn acquire(&self, info_hash: &str) -> usize {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let count = counts.entry(info_hash.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Drop one reference. Returns `true` when it was the last one.
    pub fn release(&self, info_hash: &str) -> bool {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        match counts.get_mut(info_hash) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                counts.remove(info_hash);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, info_hash: &str) -> usize {
        self.counts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(info_hash)
            .copied()
            .unwrap_or(0)
    }
}

/// Embedded librqbit session shared by all stream sessions.
pub struct LibrqbitEngine {
    session: Arc<Session>,
    refs: Arc<TorrentRefs>,
}

impl LibrqbitEngine {
    /// Create the engine from configuration.
    pub async fn new(config: &SwarmConfig) -> Result<Self, SwarmError> {
        let download_path = config.download_path.clone();

        tokio::fs::create_dir_all(&download_path)
            .await
            .map_err(|e| {
                SwarmError::Init(format!("Failed to create download directory: {}", e))
            })?;

        let mut opts = SessionOptions::default();

        if !config.enable_dht {
            opts.disable_dht = true;
        }

        // Range, not RangeInclusive
        if let Some(port) = config.listen_port {
            opts.listen_port_range = Some(port..port.saturating_add(1));
        }

        info!(
            download_path = %download_path.display(),
            dht_enabled = !opts.disable_dht,
            "Initializing librqbit session"
        );

        let session = Session::new_with_opts(download_path.clone(), opts)
            .await
            .map_err(|e| SwarmError::Init(format!("Failed to initialize librqbit session: {}", e)))?;

        if let Some(port) = session.tcp_listen_port() {
            info!(port = port, "librqbit listening on TCP port");
        }

        Ok(Self {
            session,
            refs: Arc::new(TorrentRefs::default()),
        })
    }
}

/// Live rates of one torrent. librqbit's `mbps` field holds MiB/s.
fn torrent_throughput(torrent: &ManagedTorrent) -> Throughput {
    torrent
        .stats()
        .live
        .map(|live| Throughput {
            download_bytes_per_sec: (live.download_speed.mbps * 1024.0 * 1024.0) as u64,
            upload_bytes_per_sec: (live.upload_speed.mbps * 1024.0 * 1024.0) as u64,
        })
        .unwrap_or_default()
}

#[async_trait]
impl SwarmEngine for LibrqbitEngine {
    fn name(&self) -> &str {
        "librqbit"
    }

    async fn join(&self, magnet_uri: &str) -> Result<Arc<dyn SwarmHandle>, SwarmError> {
        if !magnet_uri.starts_with("magnet:") {
            return Err(SwarmError::InvalidMagnet(magnet_uri.to_string()));
        }

        let opts = AddTorrentOptions {
            overwrite: true,
            ..Default::default()
        };

        // Resolves once metadata has been fetched from peers.
        let response = self
            .session
            .add_torrent(RqbitAddTorrent::from_url(magnet_uri), Some(opts))
            .await
            .map_err(|e| SwarmError::Unreachable(e.to_string()))?;

        let torrent = match response {
            AddTorrentResponse::Added(_, handle) => handle,
            AddTorrentResponse::AlreadyManaged(_, handle) => {
                debug!(info_hash = %handle.info_hash().as_string(), "Torrent already managed, sharing it");
                handle
            }
            AddTorrentResponse::ListOnly(_) => {
                return Err(SwarmError::Engine(
                    "Torrent was added in list-only mode".to_string(),
                ))
            }
        };

        let info_hash = torrent.info_hash().as_string();
        let handles = self.refs.acquire(&info_hash);
        debug!(
            info_hash = %info_hash,
            name = ?torrent.name(),
            handles = handles,
            "Joined swarm"
        );

        Ok(Arc::new(LibrqbitHandle {
            session: self.session.clone(),
            refs: self.refs.clone(),
            torrent,
            destroyed: AtomicBool::new(false),
        }))
    }

    fn aggregate_throughput(&self) -> Throughput {
        self.session.with_torrents(|iter| {
            iter.map(|(_, torrent)| torrent_throughput(torrent))
                .fold(Throughput::default(), |acc, t| acc + t)
        })
    }

    async fn shutdown(&self) {
        info!("Stopping librqbit session");
        self.session.stop().await;
    }
}

/// One torrent inside the shared session.
pub struct LibrqbitHandle {
    session: Arc<Session>,
    refs: Arc<TorrentRefs>,
    torrent: Arc<ManagedTorrent>,
    destroyed: AtomicBool,
}

#[async_trait]
impl SwarmHandle for LibrqbitHandle {
    fn info_hash(&self) -> String {
        self.torrent.info_hash().as_string()
    }

    async fn wait_metadata(&self) -> Result<Vec<SwarmFile>, SwarmError> {
        self.torrent
            .wait_until_initialized()
            .await
            .map_err(|e| SwarmError::Engine(e.to_string()))?;

        self.torrent
            .with_metadata(|metadata| {
                metadata
                    .file_infos
                    .iter()
                    .enumerate()
                    .map(|(index, file)| SwarmFile {
                        index,
                        path: file.relative_filename.to_string_lossy().into_owned(),
                        size_bytes: file.len,
                    })
                    .collect()
            })
            .map_err(|e| SwarmError::Engine(e.to_string()))
    }

    async fn open_reader(
        &self,
        file_index: usize,
        start_byte: u64,
    ) -> Result<SwarmReader, SwarmError> {
        if self.is_destroyed() {
            return Err(SwarmError::Destroyed);
        }

        let mut stream = self
            .torrent
            .clone()
            .stream(file_index)
            .map_err(|_| SwarmError::FileNotFound(file_index))?;

        if start_byte > 0 {
            stream
                .seek(SeekFrom::Start(start_byte))
                .await
                .map_err(|e| SwarmError::Engine(e.to_string()))?;
        }

        Ok(Box::pin(stream))
    }

    fn progress(&self) -> f64 {
        let stats = self.torrent.stats();
        if stats.total_bytes > 0 {
            stats.progress_bytes as f64 / stats.total_bytes as f64
        } else {
            0.0
        }
    }

    fn throughput(&self) -> Throughput {
        torrent_throughput(&self.torrent)
    }

    async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        let info_hash = self.info_hash();
        metrics::SWARMS_DESTROYED.inc();
        if !self.refs.release(&info_hash) {
            debug!(
                info_hash = %info_hash,
                handles = self.refs.count(&info_hash),
                "Swarm handle released, torrent still shared"
            );
            return;
        }

        // Deleting files drops the partially downloaded fragments too.
        if let Err(e) = self.session.delete(self.torrent.id().into(), true).await {
            warn!(info_hash = %info_hash, error = %e, "Failed to remove torrent");
        } else {
            debug!(info_hash = %info_hash, "Swarm destroyed");
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
