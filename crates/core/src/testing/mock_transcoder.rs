//! Mock transcoder for testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use crate::transcode::{
    Transcode, TranscodeError, TranscodeInput, TranscodeOutput, TranscodeProcess, TranscodeState,
    TranscodeStateCell, Transcoder,
};

/// Mock implementation of the Transcoder trait.
///
/// Each start drains its input in the background and emits the configured
/// chunks. By default the run then completes; it can instead fail, or stay
/// open until killed like a live transcode of a long file.
///
/// # Example
///
/// ```rust,ignore
/// let transcoder = Arc::new(MockTranscoder::new().with_chunks(vec![b"moof".to_vec()]).held_open());
/// // ... start a session, drop its stream ...
/// assert_eq!(transcoder.kill_count(), 1);
/// ```
#[derive(Debug)]
pub struct MockTranscoder {
    chunks: Vec<Bytes>,
    hold_open: bool,
    fail_exit: bool,
    fail_start: Option<String>,
    offsets: Mutex<Vec<u64>>,
    processes: Mutex<Vec<Arc<MockTranscodeProcess>>>,
    kills: Arc<AtomicUsize>,
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            chunks: vec![Bytes::from_static(b"mock-fragment")],
            hold_open: false,
            fail_exit: false,
            fail_start: None,
            offsets: Mutex::new(Vec::new()),
            processes: Mutex::new(Vec::new()),
            kills: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Output chunks, emitted in order.
    pub fn with_chunks<B: Into<Bytes>>(mut self, chunks: Vec<B>) -> Self {
        self.chunks = chunks.into_iter().map(Into::into).collect();
        self
    }

    /// After the chunks, keep the output open until the process is killed.
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// After the chunks, end with an error item and a failed state.
    pub fn with_exit_failure(mut self) -> Self {
        self.fail_exit = true;
        self
    }

    /// `start` itself fails.
    pub fn with_start_failure(mut self, reason: impl Into<String>) -> Self {
        self.fail_start = Some(reason.into());
        self
    }

    /// Start offsets received, in call order.
    pub fn start_offsets(&self) -> Vec<u64> {
        self.offsets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn processes(&self) -> Vec<Arc<MockTranscodeProcess>> {
        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Kill requests that reached a process. Repeats on one process count once.
    pub fn kill_count(&self) -> usize {
        self.kills.load(Ordering::SeqCst)
    }

    fn output(&self, process: Arc<MockTranscodeProcess>) -> TranscodeOutput {
        struct Cursor {
            chunks: VecDeque<Bytes>,
            process: Arc<MockTranscodeProcess>,
            hold_open: bool,
            fail_exit: bool,
        }

        let cursor = Cursor {
            chunks: self.chunks.iter().cloned().collect(),
            process,
            hold_open: self.hold_open,
            fail_exit: self.fail_exit,
        };

        futures::stream::unfold(Some(cursor), |slot| async move {
            let mut cursor = slot?;
            let state = &cursor.process.state;
            if state.current().is_terminal() {
                return None;
            }
            if let Some(chunk) = cursor.chunks.pop_front() {
                state.transition(TranscodeState::Running);
                return Some((Ok(chunk), Some(cursor)));
            }
            if cursor.hold_open {
                state.wait_terminal().await;
                return None;
            }
            state.transition(TranscodeState::Running);
            if cursor.fail_exit {
                state.transition(TranscodeState::Failed);
                return Some((Err(std::io::Error::other("mock transcode failed")), None));
            }
            state.transition(TranscodeState::Completed);
            None
        })
        .boxed()
    }
}

#[async_trait]
impl Transcoder for MockTranscoder {
    fn name(&self) -> &str {
        "mock"
    }

    async fn start(
        &self,
        mut input: TranscodeInput,
        start_offset_secs: u64,
    ) -> Result<Transcode, TranscodeError> {
        self.offsets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(start_offset_secs);

        if let Some(reason) = &self.fail_start {
            return Err(TranscodeError::Failed {
                reason: reason.clone(),
            });
        }

        let process = Arc::new(MockTranscodeProcess {
            state: TranscodeStateCell::new(),
            kill_requested: AtomicBool::new(false),
            kills: self.kills.clone(),
            input_bytes: Arc::new(AtomicU64::new(0)),
        });

        let input_bytes = process.input_bytes.clone();
        tokio::spawn(async move {
            if let Ok(n) = tokio::io::copy(&mut input, &mut tokio::io::sink()).await {
                input_bytes.store(n, Ordering::SeqCst);
            }
        });

        self.processes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(process.clone());

        Ok(Transcode {
            output: self.output(process.clone()),
            process,
        })
    }
}

/// Control handle of one mock transcode.
#[derive(Debug)]
pub struct MockTranscodeProcess {
    state: TranscodeStateCell,
    kill_requested: AtomicBool,
    kills: Arc<AtomicUsize>,
    input_bytes: Arc<AtomicU64>,
}

impl MockTranscodeProcess {
    /// Bytes read from the input once it reached EOF.
    pub fn input_bytes(&self) -> u64 {
        self.input_bytes.load(Ordering::SeqCst)
    }

    pub fn kill_requested(&self) -> bool {
        self.kill_requested.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscodeProcess for MockTranscodeProcess {
    fn state(&self) -> TranscodeState {
        self.state.current()
    }

    fn request_kill(&self) {
        if self.kill_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.state.transition(TranscodeState::Killed);
    }

    async fn wait(&self) -> TranscodeState {
        self.state.wait_terminal().await
    }
}
