//! Primary media file selection.

use super::{SwarmError, SwarmFile};

/// Extensions treated as playable video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "ts"];

pub fn is_video_path(path: &str) -> bool {
    path.rsplit_once('.')
        .map(|(_, ext)| VIDEO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pick the file to stream.
///
/// A single video file wins outright. With several video files the largest
/// of them is taken (samples and extras are smaller); with none, the largest
/// file overall. An empty torrent has nothing to play.
pub fn select_playable_file(files: &[SwarmFile]) -> Result<&SwarmFile, SwarmError> {
    let videos: Vec<&SwarmFile> = files.iter().filter(|f| is_video_path(&f.path)).collect();

    let chosen = match videos.as_slice() {
        [only] => Some(*only),
        [] => largest(files.iter()),
        many => largest(many.iter().copied()),
    };

    chosen.ok_or(SwarmError::NoFiles)
}

/// Largest by size; the earliest file wins ties.
fn largest<'a>(files: impl Iterator<Item = &'a SwarmFile>) -> Option<&'a SwarmFile> {
    files.fold(None, |best: Option<&SwarmFile>, file| match best {
        Some(b) if b.size_bytes >= file.size_bytes => Some(b),
        _ => Some(file),
    })
}
