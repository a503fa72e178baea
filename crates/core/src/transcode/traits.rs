//! Transcoder traits.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::io::AsyncRead;

use super::{TranscodeError, TranscodeState};

/// Source bytes fed to the transcoder.
pub type TranscodeInput = Pin<Box<dyn AsyncRead + Send>>;

/// Transcoded bytes in production order. Ends at process EOF; an `Err` item
/// is terminal.
pub type TranscodeOutput = BoxStream<'static, Result<Bytes, std::io::Error>>;

/// A started transcode: its control handle and its output.
pub struct Transcode {
    pub process: Arc<dyn TranscodeProcess>,
    pub output: TranscodeOutput,
}

/// Control over one running transcode.
#[async_trait]
pub trait TranscodeProcess: Send + Sync {
    fn state(&self) -> TranscodeState;

    /// Request a force-kill without waiting. Repeated calls are no-ops.
    fn request_kill(&self);

    /// Force-kill and wait until the run is terminal.
    async fn kill(&self) -> TranscodeState {
        self.request_kill();
        self.wait().await
    }

    /// Wait until the run reaches a terminal state.
    async fn wait(&self) -> TranscodeState;
}

/// Starts transcodes.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Start transcoding `input`, seeking the source to `start_offset_secs`.
    ///
    /// The offset is a position on the media timeline, not a byte offset.
    async fn start(
        &self,
        input: TranscodeInput,
        start_offset_secs: u64,
    ) -> Result<Transcode, TranscodeError>;
}
