//! Mock companion stream tool for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::player::{CompanionStream, PlayerError, StreamTool};

/// Mock implementation of the StreamTool trait.
///
/// Streams get sequential ports from 9000 and are kept in memory; no
/// process is spawned.
#[derive(Debug, Default)]
pub struct MockStreamTool {
    streams: Arc<RwLock<HashMap<String, CompanionStream>>>,
    qualities: Vec<String>,
    fail: bool,
    counter: Arc<RwLock<u16>>,
    shutdown_called: Arc<RwLock<bool>>,
}

impl MockStreamTool {
    pub fn new() -> Self {
        Self {
            qualities: vec!["best".to_string(), "720p".to_string(), "worst".to_string()],
            ..Default::default()
        }
    }

    /// Qualities returned by the probe.
    pub fn with_qualities(mut self, qualities: &[&str]) -> Self {
        self.qualities = qualities.iter().map(|q| q.to_string()).collect();
        self
    }

    /// Starting streams and probing fail as if the tool were missing.
    pub fn with_failure(mut self) -> Self {
        self.fail = true;
        self
    }

    pub async fn was_shut_down(&self) -> bool {
        *self.shutdown_called.read().await
    }

    fn missing_tool() -> PlayerError {
        PlayerError::ToolNotFound {
            path: "mock-streamlink".to_string(),
        }
    }
}

#[async_trait]
impl StreamTool for MockStreamTool {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start_stream(
        &self,
        url: &str,
        quality: Option<&str>,
    ) -> Result<CompanionStream, PlayerError> {
        if url.trim().is_empty() {
            return Err(PlayerError::InvalidUrl(url.to_string()));
        }
        if self.fail {
            return Err(Self::missing_tool());
        }

        let mut counter = self.counter.write().await;
        let port = 9000 + *counter;
        *counter += 1;

        let stream = CompanionStream {
            id: format!("mock-stream-{}", port),
            url: url.to_string(),
            quality: quality.unwrap_or("best").to_string(),
            port,
            local_url: format!("http://127.0.0.1:{}/", port),
            started_at: Utc::now(),
        };
        self.streams
            .write()
            .await
            .insert(stream.id.clone(), stream.clone());
        Ok(stream)
    }

    async fn stop_stream(&self, id: &str) -> bool {
        self.streams.write().await.remove(id).is_some()
    }

    fn list_streams(&self) -> Vec<CompanionStream> {
        self.streams
            .try_read()
            .map(|streams| {
                let mut list: Vec<CompanionStream> = streams.values().cloned().collect();
                list.sort_by_key(|s| s.port);
                list
            })
            .unwrap_or_default()
    }

    async fn list_qualities(&self, url: &str) -> Result<Vec<String>, PlayerError> {
        if url.trim().is_empty() {
            return Err(PlayerError::InvalidUrl(url.to_string()));
        }
        if self.fail {
            return Err(Self::missing_tool());
        }
        Ok(self.qualities.clone())
    }

    async fn shutdown_all(&self) {
        self.streams.write().await.clear();
        *self.shutdown_called.write().await = true;
    }
}
