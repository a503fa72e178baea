//! Configuration for the transcoder.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Encoding profile for live transcodes.
///
/// Defaults favour encode latency over compression: fastest x264 preset and
/// a bounded rate/buffer so output starts flowing quickly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscoderConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    #[serde(default = "default_video_codec")]
    pub video_codec: String,

    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// x264 preset.
    #[serde(default = "default_preset")]
    pub preset: String,

    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Peak video bitrate (`-maxrate`).
    #[serde(default = "default_max_rate")]
    pub max_rate: String,

    /// Rate control buffer (`-bufsize`).
    #[serde(default = "default_buf_size")]
    pub buf_size: String,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional output arguments, inserted before the output target.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_video_codec() -> String {
    "libx264".to_string()
}

fn default_audio_codec() -> String {
    "aac".to_string()
}

fn default_preset() -> String {
    "ultrafast".to_string()
}

fn default_crf() -> u8 {
    23
}

fn default_max_rate() -> String {
    "2M".to_string()
}

fn default_buf_size() -> String {
    "4M".to_string()
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            video_codec: default_video_codec(),
            audio_codec: default_audio_codec(),
            preset: default_preset(),
            crf: default_crf(),
            max_rate: default_max_rate(),
            buf_size: default_buf_size(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}
