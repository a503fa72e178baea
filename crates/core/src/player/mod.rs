//! External player companion.
//!
//! A lighter alternative to the swarm and transcode pipeline: an external
//! stream tool re-serves a remote stream on a local HTTP port that any media
//! player can open.

mod error;
mod streamlink;
mod types;

pub use error::PlayerError;
pub use streamlink::StreamlinkTool;
pub use types::{CompanionStream, StreamTool};
