//! Error types for stream sessions.

use thiserror::Error;

use super::EndReason;

/// Why a session could not start streaming.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Content not found: {0}")]
    ContentNotFound(String),

    #[error("No torrent available for {0}")]
    NoTorrentAvailable(String),

    #[error("Swarm unreachable: {0}")]
    SwarmUnreachable(String),

    #[error("No playable file in torrent")]
    NoPlayableFile,

    #[error("Transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("Session cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SessionError {
    /// The end reason recorded when startup fails with this error.
    pub fn end_reason(&self) -> EndReason {
        match self {
            SessionError::ContentNotFound(_) => EndReason::ContentNotFound,
            SessionError::NoTorrentAvailable(_) => EndReason::NoTorrentAvailable,
            SessionError::SwarmUnreachable(_) => EndReason::SwarmUnreachable,
            SessionError::NoPlayableFile => EndReason::NoPlayableFile,
            SessionError::TranscodeFailed(_) => EndReason::TranscodeFailed,
            SessionError::Cancelled => EndReason::Cancelled,
            SessionError::Internal(_) => EndReason::Internal,
        }
    }
}
