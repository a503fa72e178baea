//! FFmpeg-based live transcoder.
//!
//! Input is pumped into ffmpeg's stdin by a task; stdout is exposed as a
//! byte stream read on demand, so a slow consumer leaves ffmpeg blocked on a
//! full pipe instead of buffering in memory.

use std::collections::VecDeque;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::process::{ProcessExit, SupervisedProcess};

use super::config::TranscoderConfig;
use super::error::TranscodeError;
use super::state::{TranscodeState, TranscodeStateCell};
use super::traits::{Transcode, TranscodeInput, TranscodeOutput, TranscodeProcess, Transcoder};

const CHUNK_SIZE: usize = 64 * 1024;
const STDERR_TAIL_LINES: usize = 20;
/// How long to wait for the exit status once stdout is closed.
const EXIT_GRACE: Duration = Duration::from_secs(5);

/// FFmpeg-based transcoder producing fragmented MP4.
pub struct FfmpegTranscoder {
    config: TranscoderConfig,
}

impl FfmpegTranscoder {
    /// Creates a new FFmpeg transcoder with the given configuration.
    pub fn new(config: TranscoderConfig) -> Self {
        Self { config }
    }

    /// Builds ffmpeg arguments for a pipe-to-pipe transcode.
    pub fn build_args(&self, start_offset_secs: u64) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
        ];

        // Input seek: placed before -i so it applies to the source timeline.
        if start_offset_secs > 0 {
            args.extend(["-ss".to_string(), start_offset_secs.to_string()]);
        }

        args.extend(["-i".to_string(), "pipe:0".to_string()]);

        // Video
        args.extend([
            "-c:v".to_string(),
            self.config.video_codec.clone(),
            "-preset".to_string(),
            self.config.preset.clone(),
            "-crf".to_string(),
            self.config.crf.to_string(),
            "-maxrate".to_string(),
            self.config.max_rate.clone(),
            "-bufsize".to_string(),
            self.config.buf_size.clone(),
        ]);

        // Audio
        args.extend(["-c:a".to_string(), self.config.audio_codec.clone()]);

        // Fragmented output playable before the file is complete
        args.extend([
            "-movflags".to_string(),
            "frag_keyframe+empty_moov+default_base_moof".to_string(),
        ]);

        args.extend(self.config.extra_args.iter().cloned());

        args.extend(["-f".to_string(), "mp4".to_string(), "pipe:1".to_string()]);
        args
    }

    /// Copies the source into ffmpeg's stdin, closing it at EOF.
    fn spawn_input_pump(mut input: TranscodeInput, mut stdin: ChildStdin) {
        tokio::spawn(async move {
            match tokio::io::copy(&mut input, &mut stdin).await {
                Ok(bytes) => debug!(bytes = bytes, "Transcoder input reached EOF"),
                // Broken pipe is the normal outcome when ffmpeg is killed.
                Err(e) => debug!(error = %e, "Transcoder input pump stopped"),
            }
        });
    }

    /// Drains stderr, keeping the last lines for failure reports.
    fn spawn_stderr_reader(stderr: ChildStderr, tail: Arc<Mutex<VecDeque<String>>>) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(line = %line, "ffmpeg");
                if let Ok(mut tail) = tail.lock() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }
        });
    }

    /// Moves the state machine to its terminal state once the process ends.
    fn spawn_exit_watcher(
        process: Arc<SupervisedProcess>,
        state: Arc<TranscodeStateCell>,
        stderr_tail: Arc<Mutex<VecDeque<String>>>,
    ) {
        tokio::spawn(async move {
            let exit = process.wait().await;
            let terminal = match &exit {
                ProcessExit::Killed => TranscodeState::Killed,
                ProcessExit::Exited(status) if status.success() => {
                    // Output may still sit unread in the pipe; the run did happen.
                    state.transition(TranscodeState::Running);
                    TranscodeState::Completed
                }
                ProcessExit::Exited(_) | ProcessExit::WaitFailed(_) => TranscodeState::Failed,
            };

            if terminal == TranscodeState::Failed {
                let tail = stderr_tail
                    .lock()
                    .map(|t| t.iter().cloned().collect::<Vec<_>>().join("\n"))
                    .unwrap_or_default();
                warn!(exit = ?exit, stderr = %tail, "Transcoder failed");
            } else {
                debug!(exit = ?exit, state = terminal.as_str(), "Transcoder ended");
            }

            if state.transition(terminal) {
                metrics::TRANSCODE_EXITS
                    .with_label_values(&[terminal.as_str()])
                    .inc();
            }
        });
    }

    /// Stdout as a chunked byte stream. The first chunk marks the run as running.
    ///
    /// At EOF the stream waits for the process outcome: a failed run ends the
    /// stream with an error instead of a clean end of output.
    fn output_stream(stdout: ChildStdout, state: Arc<TranscodeStateCell>) -> TranscodeOutput {
        futures::stream::unfold(Some((stdout, state)), |slot| async move {
            let (mut stdout, state) = slot?;
            let mut buf = vec![0u8; CHUNK_SIZE];
            match stdout.read(&mut buf).await {
                Ok(0) => match timeout(EXIT_GRACE, state.wait_terminal()).await {
                    Ok(TranscodeState::Failed) => Some((
                        Err(io::Error::other("transcoder exited with an error")),
                        None,
                    )),
                    Ok(_) => None,
                    Err(_) => {
                        warn!("Transcoder closed its output but did not exit");
                        None
                    }
                },
                Ok(n) => {
                    buf.truncate(n);
                    state.transition(TranscodeState::Running);
                    Some((Ok(Bytes::from(buf)), Some((stdout, state))))
                }
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn start(
        &self,
        input: TranscodeInput,
        start_offset_secs: u64,
    ) -> Result<Transcode, TranscodeError> {
        let args = self.build_args(start_offset_secs);
        debug!(args = ?args, "Spawning ffmpeg");

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TranscodeError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    TranscodeError::Io(e)
                }
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or(TranscodeError::PipeUnavailable("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(TranscodeError::PipeUnavailable("stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or(TranscodeError::PipeUnavailable("stderr"))?;

        let process = Arc::new(SupervisedProcess::supervise("ffmpeg", child));
        let state = Arc::new(TranscodeStateCell::new());
        let stderr_tail = Arc::new(Mutex::new(VecDeque::with_capacity(STDERR_TAIL_LINES)));

        Self::spawn_input_pump(input, stdin);
        Self::spawn_stderr_reader(stderr, stderr_tail.clone());
        Self::spawn_exit_watcher(process.clone(), state.clone(), stderr_tail);

        metrics::TRANSCODES_STARTED.inc();
        info!(
            pid = ?process.pid(),
            start_offset_secs = start_offset_secs,
            "Transcoder started"
        );

        let output = Self::output_stream(stdout, state.clone());
        Ok(Transcode {
            process: Arc::new(FfmpegProcess { process, state }),
            output,
        })
    }
}

/// Handle on a running ffmpeg transcode.
pub struct FfmpegProcess {
    process: Arc<SupervisedProcess>,
    state: Arc<TranscodeStateCell>,
}

#[async_trait]
impl TranscodeProcess for FfmpegProcess {
    fn state(&self) -> TranscodeState {
        self.state.current()
    }

    fn request_kill(&self) {
        self.process.request_kill();
    }

    async fn wait(&self) -> TranscodeState {
        self.state.wait_terminal().await
    }
}
