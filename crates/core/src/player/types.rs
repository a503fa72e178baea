use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::PlayerError;

/// A running companion stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionStream {
    pub id: String,
    pub url: String,
    pub quality: String,
    pub port: u16,
    /// Where a player can open the re-served stream.
    pub local_url: String,
    pub started_at: DateTime<Utc>,
}

/// An external tool that re-serves remote streams locally.
#[async_trait]
pub trait StreamTool: Send + Sync {
    fn name(&self) -> &str;

    /// Start re-serving `url`. `quality` falls back to the configured default.
    async fn start_stream(
        &self,
        url: &str,
        quality: Option<&str>,
    ) -> Result<CompanionStream, PlayerError>;

    /// Stop a stream. Unknown ids are a no-op returning `false`.
    async fn stop_stream(&self, id: &str) -> bool;

    fn list_streams(&self) -> Vec<CompanionStream>;

    /// Quality labels the tool can offer for `url`, without starting a stream.
    async fn list_qualities(&self, url: &str) -> Result<Vec<String>, PlayerError>;

    /// Stop every running stream and wait for the processes to exit.
    async fn shutdown_all(&self);
}
