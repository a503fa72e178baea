//! The byte stream handed to the HTTP layer.

use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::transcode::TranscodeOutput;

use super::manager::SessionManager;
use super::{EndReason, SessionId};

/// Transcoded output of a live session.
///
/// Dropping it tears the session down: a drop before the end of output means
/// the client went away.
pub struct SessionStream {
    id: SessionId,
    output: TranscodeOutput,
    manager: Weak<SessionManager>,
    outcome: Option<EndReason>,
}

impl SessionStream {
    pub(crate) fn new(id: SessionId, output: TranscodeOutput, manager: Weak<SessionManager>) -> Self {
        Self {
            id,
            output,
            manager,
            outcome: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.id
    }
}

impl Stream for SessionStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = self.output.poll_next_unpin(cx);
        match &polled {
            Poll::Ready(None) => self.outcome = Some(EndReason::Completed),
            Poll::Ready(Some(Err(_))) => self.outcome = Some(EndReason::TranscodeFailed),
            _ => {}
        }
        polled
    }
}

impl Drop for SessionStream {
    fn drop(&mut self) {
        let reason = self.outcome.unwrap_or(EndReason::ClientDisconnected);
        if let Some(manager) = self.manager.upgrade() {
            manager.teardown(&self.id, reason);
        }
    }
}

impl std::fmt::Debug for SessionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStream")
            .field("id", &self.id)
            .field("outcome", &self.outcome)
            .finish()
    }
}
