//! Session state machine and teardown guard.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    ClientDisconnected,
    Completed,
    TranscodeFailed,
    Stopped,
    Shutdown,
    ContentNotFound,
    NoTorrentAvailable,
    SwarmUnreachable,
    NoPlayableFile,
    Cancelled,
    Internal,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::ClientDisconnected => "client_disconnected",
            EndReason::Completed => "completed",
            EndReason::TranscodeFailed => "transcode_failed",
            EndReason::Stopped => "stopped",
            EndReason::Shutdown => "shutdown",
            EndReason::ContentNotFound => "content_not_found",
            EndReason::NoTorrentAvailable => "no_torrent_available",
            EndReason::SwarmUnreachable => "swarm_unreachable",
            EndReason::NoPlayableFile => "no_playable_file",
            EndReason::Cancelled => "cancelled",
            EndReason::Internal => "internal",
        }
    }
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Joining,
    AwaitingMetadata,
    FileSelected,
    Transcoding,
    Ended(EndReason),
}

impl SessionState {
    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended(_))
    }

    /// Forward steps only; any live state may end; nothing leaves `Ended`.
    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Ended(_), _) => false,
            (_, Ended(_)) => true,
            (Joining, AwaitingMetadata)
            | (AwaitingMetadata, FileSelected)
            | (FileSelected, Transcoding) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Joining => "joining",
            SessionState::AwaitingMetadata => "awaiting_metadata",
            SessionState::FileSelected => "file_selected",
            SessionState::Transcoding => "transcoding",
            SessionState::Ended(_) => "ended",
        }
    }
}

const ACTIVE: u8 = 0;
const TORN_DOWN: u8 = 1;

/// Single-writer guard: the first caller of [`TeardownFlag::begin`] wins.
#[derive(Debug)]
pub struct TeardownFlag(AtomicU8);

impl Default for TeardownFlag {
    fn default() -> Self {
        Self(AtomicU8::new(ACTIVE))
    }
}

impl TeardownFlag {
    /// Flip `Active -> TornDown`. Returns `true` only for the caller that flipped it.
    pub fn begin(&self) -> bool {
        self.0
            .compare_exchange(ACTIVE, TORN_DOWN, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_torn_down(&self) -> bool {
        self.0.load(Ordering::Acquire) == TORN_DOWN
    }
}
