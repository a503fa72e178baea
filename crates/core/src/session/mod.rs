//! Stream session lifecycle.
//!
//! A session walks `Joining -> AwaitingMetadata -> FileSelected ->
//! Transcoding -> Ended(reason)`. It exclusively owns one swarm handle and
//! one transcode process, and releases both through a single teardown path
//! no matter which trigger fires first: client disconnect, transcoder exit,
//! explicit stop, or server shutdown.

mod error;
mod manager;
mod state;
mod stream;

pub use error::SessionError;
pub use manager::{PendingSession, SessionManager, SessionSnapshot};
pub use state::{EndReason, SessionState, TeardownFlag};
pub use stream::SessionStream;

/// Opaque session identifier.
pub type SessionId = String;
