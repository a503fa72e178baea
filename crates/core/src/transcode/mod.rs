//! Live transcoding of a swarm byte stream.
//!
//! A [`Transcoder`] turns an input byte stream into a fragmented MP4 byte
//! stream, starting at a given point on the source timeline. Each run is
//! observed through a [`TranscodeProcess`] whose state machine is
//! `Starting -> Running -> {Completed | Failed | Killed}`.

mod config;
mod error;
mod ffmpeg;
mod state;
mod traits;

pub use config::TranscoderConfig;
pub use error::TranscodeError;
pub use ffmpeg::{FfmpegProcess, FfmpegTranscoder};
pub use state::{TranscodeState, TranscodeStateCell};
pub use traits::{Transcode, TranscodeInput, TranscodeOutput, TranscodeProcess, Transcoder};
