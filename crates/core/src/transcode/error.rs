//! Error types for the transcode module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur starting or running a transcode.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// A stdio pipe was not captured when spawning.
    #[error("Transcoder {0} pipe unavailable")]
    PipeUnavailable(&'static str),

    /// The process ended unsuccessfully.
    #[error("Transcode failed: {reason}")]
    Failed { reason: String },

    /// I/O error spawning or talking to the process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
