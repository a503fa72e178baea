//! Swarm engine: join by magnet, enumerate files, stream while downloading.
//!
//! One [`SwarmEngine`] instance is created by the process entry point and
//! shared by every session. Each joined torrent is an independent
//! [`SwarmHandle`] owned by exactly one session.

mod librqbit;
mod select;
mod types;

pub use self::librqbit::{LibrqbitEngine, LibrqbitHandle};
pub use select::{is_video_path, select_playable_file, VIDEO_EXTENSIONS};
pub use types::*;
