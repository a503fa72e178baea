//! Transcode state machine.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle of one transcoder run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeState {
    /// Spawned, no output yet.
    Starting,
    /// Producing output.
    Running,
    Completed,
    Failed,
    Killed,
}

impl TranscodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TranscodeState::Completed | TranscodeState::Failed | TranscodeState::Killed
        )
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// A run can fail or be killed before producing output, but can only
    /// complete once it has been running.
    pub fn can_transition_to(&self, next: TranscodeState) -> bool {
        use TranscodeState::*;
        matches!(
            (self, next),
            (Starting, Running)
                | (Starting, Failed)
                | (Starting, Killed)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Killed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TranscodeState::Starting => "starting",
            TranscodeState::Running => "running",
            TranscodeState::Completed => "completed",
            TranscodeState::Failed => "failed",
            TranscodeState::Killed => "killed",
        }
    }
}

/// Shared, observable transcode state that only accepts legal transitions.
#[derive(Debug)]
pub struct TranscodeStateCell {
    tx: watch::Sender<TranscodeState>,
}

impl Default for TranscodeStateCell {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodeStateCell {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(TranscodeState::Starting);
        Self { tx }
    }

    pub fn current(&self) -> TranscodeState {
        *self.tx.borrow()
    }

    /// Apply a transition if legal. Returns whether the state changed.
    pub fn transition(&self, next: TranscodeState) -> bool {
        self.tx.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        })
    }

    /// Resolve once a terminal state is reached.
    pub async fn wait_terminal(&self) -> TranscodeState {
        let mut rx = self.tx.subscribe();
        let state = match rx.wait_for(TranscodeState::is_terminal).await {
            Ok(state) => *state,
            Err(_) => self.current(),
        };
        state
    }
}
