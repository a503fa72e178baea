//! Mock swarm engine for testing.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::content::info_hash_from_magnet;
use crate::swarm::{SwarmEngine, SwarmError, SwarmFile, SwarmHandle, SwarmReader, Throughput};

/// Mock implementation of the SwarmEngine trait.
///
/// Every joined swarm exposes the configured file list and serves the
/// configured bytes for any file. Destroy calls are counted across all
/// handles so tests can assert exactly-once release.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Arc::new(MockSwarmEngine::new().with_files(fixtures::movie_files()));
/// // ... run a session to its end ...
/// assert_eq!(engine.destroy_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockSwarmEngine {
    files: Vec<SwarmFile>,
    content: Arc<Vec<u8>>,
    join_delay: Option<Duration>,
    metadata_delay: Option<Duration>,
    fail_join: bool,
    throughput: Throughput,
    joined: Mutex<Vec<String>>,
    handles: Mutex<Vec<Arc<MockSwarmHandle>>>,
    destroys: Arc<AtomicUsize>,
    shut_down: AtomicBool,
}

impl Default for MockSwarmEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSwarmEngine {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            content: Arc::new(b"mock media payload".to_vec()),
            join_delay: None,
            metadata_delay: None,
            fail_join: false,
            throughput: Throughput {
                download_bytes_per_sec: 2 * 1024 * 1024,
                upload_bytes_per_sec: 256 * 1024,
            },
            joined: Mutex::new(Vec::new()),
            handles: Mutex::new(Vec::new()),
            destroys: Arc::new(AtomicUsize::new(0)),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Files reported once metadata arrives.
    pub fn with_files(mut self, files: Vec<SwarmFile>) -> Self {
        self.files = files;
        self
    }

    /// Bytes served by every reader.
    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content = Arc::new(content);
        self
    }

    /// Delay before `join` returns.
    pub fn with_join_delay(mut self, delay: Duration) -> Self {
        self.join_delay = Some(delay);
        self
    }

    /// Delay before metadata arrives on joined swarms.
    pub fn with_metadata_delay(mut self, delay: Duration) -> Self {
        self.metadata_delay = Some(delay);
        self
    }

    /// `join` fails as if no peer answered.
    pub fn with_join_failure(mut self) -> Self {
        self.fail_join = true;
        self
    }

    /// Magnets passed to `join`, in call order.
    pub fn joined_magnets(&self) -> Vec<String> {
        self.joined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn handles(&self) -> Vec<Arc<MockSwarmHandle>> {
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Effective destroys across all handles. Repeated destroys of one
    /// handle count once.
    pub fn destroy_count(&self) -> usize {
        self.destroys.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwarmEngine for MockSwarmEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn join(&self, magnet_uri: &str) -> Result<Arc<dyn SwarmHandle>, SwarmError> {
        if !magnet_uri.starts_with("magnet:") {
            return Err(SwarmError::InvalidMagnet(magnet_uri.to_string()));
        }
        self.joined
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(magnet_uri.to_string());

        if let Some(delay) = self.join_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_join {
            return Err(SwarmError::Unreachable("no peers".to_string()));
        }

        let handle = Arc::new(MockSwarmHandle {
            info_hash: info_hash_from_magnet(magnet_uri).unwrap_or_else(|| "mock".to_string()),
            files: self.files.clone(),
            content: self.content.clone(),
            metadata_delay: self.metadata_delay,
            throughput: self.throughput,
            readers_opened: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            destroys: self.destroys.clone(),
        });
        self.handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle.clone());
        Ok(handle)
    }

    fn aggregate_throughput(&self) -> Throughput {
        self.handles()
            .iter()
            .filter(|h| !h.is_destroyed())
            .fold(Throughput::default(), |acc, h| acc + h.throughput())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// One joined mock swarm.
#[derive(Debug)]
pub struct MockSwarmHandle {
    info_hash: String,
    files: Vec<SwarmFile>,
    content: Arc<Vec<u8>>,
    metadata_delay: Option<Duration>,
    throughput: Throughput,
    readers_opened: AtomicUsize,
    destroyed: AtomicBool,
    destroys: Arc<AtomicUsize>,
}

impl MockSwarmHandle {
    pub fn readers_opened(&self) -> usize {
        self.readers_opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwarmHandle for MockSwarmHandle {
    fn info_hash(&self) -> String {
        self.info_hash.clone()
    }

    async fn wait_metadata(&self) -> Result<Vec<SwarmFile>, SwarmError> {
        if let Some(delay) = self.metadata_delay {
            tokio::time::sleep(delay).await;
        }
        if self.is_destroyed() {
            return Err(SwarmError::Destroyed);
        }
        Ok(self.files.clone())
    }

    async fn open_reader(
        &self,
        file_index: usize,
        start_byte: u64,
    ) -> Result<SwarmReader, SwarmError> {
        if self.is_destroyed() {
            return Err(SwarmError::Destroyed);
        }
        if !self.files.iter().any(|f| f.index == file_index) {
            return Err(SwarmError::FileNotFound(file_index));
        }
        self.readers_opened.fetch_add(1, Ordering::SeqCst);

        let start = (start_byte as usize).min(self.content.len());
        Ok(Box::pin(std::io::Cursor::new(self.content[start..].to_vec())))
    }

    fn progress(&self) -> f64 {
        0.5
    }

    fn throughput(&self) -> Throughput {
        self.throughput
    }

    async fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.destroys.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}
