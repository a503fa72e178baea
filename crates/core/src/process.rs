//! Supervision of external child processes.
//!
//! A [`SupervisedProcess`] owns a spawned child through a watcher task. The
//! watcher reaps the child when it exits on its own, or force-kills it when a
//! kill is requested. Exit is published on a watch channel so any number of
//! callers can await it. Kill requests are idempotent: only the first one
//! reaches the child.

use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::process::Child;
use tokio::sync::watch;
use tracing::{debug, warn};

/// How a supervised process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessExit {
    /// The process exited on its own.
    Exited(ExitStatus),
    /// The process was force-killed on request.
    Killed,
    /// Waiting on the process failed.
    WaitFailed(String),
}

impl ProcessExit {
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessExit::Exited(status) if status.success())
    }
}

enum WatchEvent {
    Exited(std::io::Result<ExitStatus>),
    KillRequested,
}

/// A child process with exactly-once force-kill and observable exit.
pub struct SupervisedProcess {
    label: String,
    pid: Option<u32>,
    kill_requested: AtomicBool,
    kill_tx: watch::Sender<bool>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
}

impl SupervisedProcess {
    /// Hand a spawned child to a watcher task.
    ///
    /// Take any piped stdio from the child before calling this.
    pub fn supervise(label: impl Into<String>, mut child: Child) -> Self {
        let label = label.into();
        let pid = child.id();
        let (kill_tx, mut kill_rx) = watch::channel(false);
        let (exit_tx, exit_rx) = watch::channel(None);

        let task_label = label.clone();
        tokio::spawn(async move {
            let event = tokio::select! {
                status = child.wait() => WatchEvent::Exited(status),
                // Also fires if the supervisor is dropped.
                _ = kill_rx.wait_for(|requested| *requested) => WatchEvent::KillRequested,
            };

            let exit = match event {
                WatchEvent::Exited(Ok(status)) => ProcessExit::Exited(status),
                WatchEvent::Exited(Err(e)) => ProcessExit::WaitFailed(e.to_string()),
                WatchEvent::KillRequested => match child.try_wait() {
                    Ok(Some(status)) => ProcessExit::Exited(status),
                    _ => {
                        if let Err(e) = child.kill().await {
                            warn!(process = %task_label, error = %e, "Failed to kill process");
                        }
                        ProcessExit::Killed
                    }
                },
            };

            debug!(process = %task_label, pid = ?pid, exit = ?exit, "Process ended");
            let _ = exit_tx.send(Some(exit));
        });

        Self {
            label,
            pid,
            kill_requested: AtomicBool::new(false),
            kill_tx,
            exit_rx,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Request a force-kill without waiting for it.
    ///
    /// Returns `true` only for the call that actually issued the request.
    pub fn request_kill(&self) -> bool {
        if self.kill_requested.swap(true, Ordering::SeqCst) {
            return false;
        }
        debug!(process = %self.label, pid = ?self.pid, "Kill requested");
        let _ = self.kill_tx.send(true);
        true
    }

    /// Force-kill and wait for the process to be reaped.
    pub async fn kill(&self) -> ProcessExit {
        self.request_kill();
        self.wait().await
    }

    /// Wait for the process to end, however it ends.
    pub async fn wait(&self) -> ProcessExit {
        let mut rx = self.exit_rx.clone();
        let exit = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|exit| exit.clone());
        exit.unwrap_or_else(|| ProcessExit::WaitFailed("supervisor task ended".to_string()))
    }

    /// Exit, if the process has already ended.
    pub fn try_exit(&self) -> Option<ProcessExit> {
        self.exit_rx.borrow().clone()
    }

    pub fn kill_requested(&self) -> bool {
        self.kill_requested.load(Ordering::SeqCst)
    }
}
