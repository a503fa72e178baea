use thiserror::Error;

/// Errors from the external stream tool.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("Stream tool not found at {path}")]
    ToolNotFound { path: String },

    #[error("All {0} companion stream slots are in use")]
    NoFreePort(u16),

    #[error("Quality probe timed out after {0}s")]
    ProbeTimeout(u64),

    #[error("Quality probe failed: {0}")]
    ProbeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
