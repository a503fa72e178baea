//! Session registry and the startup/teardown paths.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use crate::aggregator::ContentResolver;
use crate::metrics;
use crate::swarm::{select_playable_file, SwarmEngine, SwarmError, SwarmFile, SwarmHandle};
use crate::transcode::{TranscodeProcess, TranscodeState, Transcoder};

use super::{EndReason, SessionError, SessionId, SessionState, SessionStream, TeardownFlag};

/// Point-in-time view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub content_id: String,
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    pub start_offset_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_file: Option<SwarmFile>,
    pub progress: f64,
    pub download_speed: u64,
    pub upload_speed: u64,
    /// Every state the session has been in, oldest first.
    pub history: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A session whose pipeline is still starting.
///
/// `ready` resolves with the output stream once transcoding has begun, or
/// with the error that stopped startup. Dropping it cancels the session.
pub struct PendingSession {
    pub id: SessionId,
    pub ready: oneshot::Receiver<Result<SessionStream, SessionError>>,
}

struct StateRecord {
    current: SessionState,
    history: Vec<SessionState>,
}

#[derive(Default)]
struct Resources {
    swarm: Option<Arc<dyn SwarmHandle>>,
    transcode: Option<Arc<dyn TranscodeProcess>>,
}

struct SessionEntry {
    id: SessionId,
    content_id: String,
    start_offset_secs: u64,
    created_at: DateTime<Utc>,
    teardown: TeardownFlag,
    state: Mutex<StateRecord>,
    resources: Mutex<Resources>,
    selected_file: Mutex<Option<SwarmFile>>,
    info_hash: Mutex<Option<String>>,
    cancel_tx: watch::Sender<bool>,
    ended_tx: watch::Sender<Option<SessionSnapshot>>,
}

impl SessionEntry {
    fn new(id: SessionId, content_id: &str, start_offset_secs: u64) -> Self {
        Self {
            id,
            content_id: content_id.to_string(),
            start_offset_secs,
            created_at: Utc::now(),
            teardown: TeardownFlag::default(),
            state: Mutex::new(StateRecord {
                current: SessionState::Joining,
                history: vec![SessionState::Joining],
            }),
            resources: Mutex::new(Resources::default()),
            selected_file: Mutex::new(None),
            info_hash: Mutex::new(None),
            cancel_tx: watch::channel(false).0,
            ended_tx: watch::channel(None).0,
        }
    }

    fn current_state(&self) -> SessionState {
        lock(&self.state).current
    }

    /// Apply a legal transition; anything else means the session is ending.
    fn transition(&self, next: SessionState) -> Result<(), SessionError> {
        let mut record = lock(&self.state);
        if !record.current.can_transition_to(next) {
            return Err(SessionError::Cancelled);
        }
        debug!(
            session_id = %self.id,
            from = record.current.as_str(),
            to = next.as_str(),
            "Session state transition"
        );
        record.current = next;
        record.history.push(next);
        Ok(())
    }

    /// Hand the swarm to the session unless teardown already started.
    fn install_swarm(&self, swarm: Arc<dyn SwarmHandle>) -> Result<(), Arc<dyn SwarmHandle>> {
        let mut resources = lock(&self.resources);
        if self.teardown.is_torn_down() {
            return Err(swarm);
        }
        *lock(&self.info_hash) = Some(swarm.info_hash());
        resources.swarm = Some(swarm);
        Ok(())
    }

    fn install_transcode(
        &self,
        transcode: Arc<dyn TranscodeProcess>,
    ) -> Result<(), Arc<dyn TranscodeProcess>> {
        let mut resources = lock(&self.resources);
        if self.teardown.is_torn_down() {
            return Err(transcode);
        }
        resources.transcode = Some(transcode);
        Ok(())
    }

    fn take_resources(&self) -> Resources {
        std::mem::take(&mut *lock(&self.resources))
    }

    async fn cancelled(&self) {
        let mut rx = self.cancel_tx.subscribe();
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    fn snapshot(&self) -> SessionSnapshot {
        let (current, history) = {
            let record = lock(&self.state);
            (record.current, record.history.clone())
        };
        let swarm = lock(&self.resources).swarm.clone();
        let (progress, throughput) = swarm
            .map(|s| (s.progress(), s.throughput()))
            .unwrap_or_default();

        SessionSnapshot {
            id: self.id.clone(),
            content_id: self.content_id.clone(),
            state: current.as_str().to_string(),
            end_reason: match current {
                SessionState::Ended(reason) => Some(reason),
                _ => None,
            },
            start_offset_seconds: self.start_offset_secs,
            info_hash: lock(&self.info_hash).clone(),
            selected_file: lock(&self.selected_file).clone(),
            progress,
            download_speed: throughput.download_bytes_per_sec,
            upload_speed: throughput.upload_bytes_per_sec,
            history: history.iter().map(|s| s.as_str().to_string()).collect(),
            created_at: self.created_at,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns every live stream session.
///
/// The registry is only touched here: insert on create, remove at the end
/// of teardown.
pub struct SessionManager {
    resolver: Arc<dyn ContentResolver>,
    engine: Arc<dyn SwarmEngine>,
    transcoder: Arc<dyn Transcoder>,
    join_timeout: Duration,
    registry: RwLock<HashMap<SessionId, Arc<SessionEntry>>>,
    weak_self: Weak<SessionManager>,
}

impl SessionManager {
    pub fn new(
        resolver: Arc<dyn ContentResolver>,
        engine: Arc<dyn SwarmEngine>,
        transcoder: Arc<dyn Transcoder>,
        join_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            resolver,
            engine,
            transcoder,
            join_timeout,
            registry: RwLock::new(HashMap::new()),
            weak_self: weak_self.clone(),
        })
    }

    /// Allocate a session and start its pipeline in the background.
    pub fn create_session(&self, content_id: &str, start_offset_secs: u64) -> PendingSession {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let entry = Arc::new(SessionEntry::new(id.clone(), content_id, start_offset_secs));

        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), entry.clone());
        metrics::SESSIONS_STARTED.inc();
        metrics::SESSIONS_ACTIVE.inc();

        info!(
            session_id = %id,
            content_id = content_id,
            start_offset_secs = start_offset_secs,
            "Session created"
        );

        let (ready_tx, ready_rx) = oneshot::channel();
        if let Some(manager) = self.weak_self.upgrade() {
            tokio::spawn(manager.run_startup(entry, ready_tx));
        }

        PendingSession {
            id,
            ready: ready_rx,
        }
    }

    async fn run_startup(
        self: Arc<Self>,
        entry: Arc<SessionEntry>,
        mut ready_tx: oneshot::Sender<Result<SessionStream, SessionError>>,
    ) {
        let result = tokio::select! {
            result = self.start_pipeline(&entry) => result,
            _ = entry.cancelled() => Err(SessionError::Cancelled),
            _ = ready_tx.closed() => Err(SessionError::Cancelled),
        };

        match result {
            Ok(stream) => {
                // A receiver that went away drops the stream, which tears down.
                let _ = ready_tx.send(Ok(stream));
            }
            Err(e) => {
                if e != SessionError::Cancelled {
                    warn!(session_id = %entry.id, error = %e, "Session startup failed");
                }
                self.teardown(&entry.id, e.end_reason());
                let _ = ready_tx.send(Err(e));
            }
        }
    }

    async fn start_pipeline(&self, entry: &Arc<SessionEntry>) -> Result<SessionStream, SessionError> {
        let item = self
            .resolver
            .resolve(&entry.content_id)
            .await
            .ok_or_else(|| SessionError::ContentNotFound(entry.content_id.clone()))?;

        let torrent = item
            .best_ref()
            .ok_or_else(|| SessionError::NoTorrentAvailable(item.id.clone()))?;

        let magnet = match self.resolver.resolve_magnet(torrent).await {
            Ok(Some(magnet)) => magnet,
            Ok(None) => return Err(SessionError::NoTorrentAvailable(item.id.clone())),
            Err(e) => {
                warn!(session_id = %entry.id, error = %e, "Magnet resolution failed");
                return Err(SessionError::NoTorrentAvailable(item.id.clone()));
            }
        };

        let started = Instant::now();
        let joined = tokio::time::timeout(self.join_timeout, self.join_swarm(entry, &magnet)).await;
        let (swarm, files) = match joined {
            Ok(Ok(joined)) => {
                metrics::SWARM_JOIN_DURATION
                    .with_label_values(&["ready"])
                    .observe(started.elapsed().as_secs_f64());
                joined
            }
            Ok(Err(e)) => {
                metrics::SWARM_JOIN_DURATION
                    .with_label_values(&["error"])
                    .observe(started.elapsed().as_secs_f64());
                return Err(e);
            }
            Err(_) => {
                metrics::SWARM_JOIN_DURATION
                    .with_label_values(&["timeout"])
                    .observe(started.elapsed().as_secs_f64());
                return Err(SessionError::SwarmUnreachable(format!(
                    "no metadata within {}s",
                    self.join_timeout.as_secs()
                )));
            }
        };

        let file = select_playable_file(&files)
            .map_err(|_| SessionError::NoPlayableFile)?
            .clone();
        info!(
            session_id = %entry.id,
            file = %file.path,
            size_bytes = file.size_bytes,
            "Selected file"
        );
        *lock(&entry.selected_file) = Some(file.clone());
        entry.transition(SessionState::FileSelected)?;

        let reader = swarm
            .open_reader(file.index, 0)
            .await
            .map_err(|e| match e {
                SwarmError::Destroyed => SessionError::Cancelled,
                other => SessionError::Internal(other.to_string()),
            })?;

        let transcode = self
            .transcoder
            .start(reader, entry.start_offset_secs)
            .await
            .map_err(|e| SessionError::TranscodeFailed(e.to_string()))?;

        if let Err(process) = entry.install_transcode(transcode.process.clone()) {
            process.request_kill();
            return Err(SessionError::Cancelled);
        }
        self.watch_transcode(entry.id.clone(), transcode.process.clone());
        entry.transition(SessionState::Transcoding)?;

        info!(session_id = %entry.id, "Session streaming");
        Ok(SessionStream::new(
            entry.id.clone(),
            transcode.output,
            self.weak_self.clone(),
        ))
    }

    async fn join_swarm(
        &self,
        entry: &Arc<SessionEntry>,
        magnet: &str,
    ) -> Result<(Arc<dyn SwarmHandle>, Vec<SwarmFile>), SessionError> {
        let swarm = self
            .engine
            .join(magnet)
            .await
            .map_err(|e| SessionError::SwarmUnreachable(e.to_string()))?;

        if let Err(swarm) = entry.install_swarm(swarm.clone()) {
            swarm.destroy().await;
            return Err(SessionError::Cancelled);
        }
        entry.transition(SessionState::AwaitingMetadata)?;
        debug!(session_id = %entry.id, info_hash = %swarm.info_hash(), "Awaiting metadata");

        let files = swarm.wait_metadata().await.map_err(|e| match e {
            SwarmError::NoFiles => SessionError::NoPlayableFile,
            other => SessionError::SwarmUnreachable(other.to_string()),
        })?;

        Ok((swarm, files))
    }

    /// End the session when its transcoder reaches a terminal state.
    fn watch_transcode(&self, id: SessionId, process: Arc<dyn TranscodeProcess>) {
        let manager = self.weak_self.clone();
        tokio::spawn(async move {
            let reason = match process.wait().await {
                TranscodeState::Completed => EndReason::Completed,
                TranscodeState::Killed => EndReason::Stopped,
                _ => EndReason::TranscodeFailed,
            };
            if let Some(manager) = manager.upgrade() {
                manager.teardown(&id, reason);
            }
        });
    }

    /// Tear a session down. Only the first call per session does anything.
    ///
    /// The kill request reaches the transcoder before this returns; the
    /// rest runs in order on a task: wait for the transcoder to die, destroy
    /// the swarm, drop the record. Returns whether this call performed it.
    pub fn teardown(&self, id: &str, reason: EndReason) -> bool {
        let Some(entry) = self.entry(id) else {
            return false;
        };
        if !entry.teardown.begin() {
            return false;
        }

        info!(session_id = %id, reason = reason.as_str(), "Tearing down session");
        entry.cancel_tx.send_replace(true);

        let resources = entry.take_resources();
        if let Some(transcode) = &resources.transcode {
            transcode.request_kill();
        }

        let manager = self.weak_self.clone();
        let release = async move {
            if let Some(transcode) = resources.transcode {
                transcode.kill().await;
            }
            if let Some(swarm) = resources.swarm {
                swarm.destroy().await;
            }

            // Ended is only ever set here, after both resources are gone.
            {
                let ended = SessionState::Ended(reason);
                let mut record = lock(&entry.state);
                record.current = ended;
                record.history.push(ended);
            }
            if let Some(manager) = manager.upgrade() {
                manager.remove(&entry.id);
            }
            metrics::SESSIONS_ENDED
                .with_label_values(&[reason.as_str()])
                .inc();
            debug!(session_id = %entry.id, reason = reason.as_str(), "Session ended");
            entry.ended_tx.send_replace(Some(entry.snapshot()));
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(release);
            }
            Err(_) => warn!(session_id = %id, "No runtime for teardown, relying on kill-on-drop"),
        }
        true
    }

    /// Explicit stop. Unknown or already-ending sessions are a no-op.
    pub fn stop_session(&self, id: &str) -> bool {
        self.teardown(id, EndReason::Stopped)
    }

    /// Tear down every session and wait until all have ended.
    pub async fn shutdown_all(&self) {
        let ids: Vec<SessionId> = self.registry_read().keys().cloned().collect();
        let waits: Vec<_> = ids
            .iter()
            .filter_map(|id| self.entry(id).map(|e| e.ended_tx.subscribe()))
            .collect();

        for id in &ids {
            self.teardown(id, EndReason::Shutdown);
        }
        for mut rx in waits {
            let _ = rx.wait_for(Option::is_some).await;
        }
        info!(sessions = ids.len(), "All sessions shut down");
    }

    /// Snapshots of live sessions. Sessions mid-teardown are not listed.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut sessions: Vec<SessionSnapshot> = self
            .registry_read()
            .values()
            .filter(|entry| !entry.teardown.is_torn_down())
            .map(|entry| entry.snapshot())
            .collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    pub fn info(&self, id: &str) -> Option<SessionSnapshot> {
        self.entry(id)
            .filter(|entry| !entry.teardown.is_torn_down())
            .map(|entry| entry.snapshot())
    }

    pub fn state(&self, id: &str) -> Option<SessionState> {
        self.entry(id).map(|entry| entry.current_state())
    }

    /// Number of sessions not yet torn down.
    pub fn active_count(&self) -> usize {
        self.registry_read()
            .values()
            .filter(|entry| !entry.teardown.is_torn_down())
            .count()
    }

    /// Wait for a session to end and return its final snapshot.
    ///
    /// `None` if the id is unknown (including sessions already removed).
    pub async fn wait_ended(&self, id: &str) -> Option<SessionSnapshot> {
        let mut rx = self.entry(id)?.ended_tx.subscribe();
        let snapshot = rx.wait_for(Option::is_some).await.ok()?.clone();
        snapshot
    }

    fn entry(&self, id: &str) -> Option<Arc<SessionEntry>> {
        self.registry_read().get(id).cloned()
    }

    fn remove(&self, id: &str) {
        let removed = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        if removed.is_some() {
            metrics::SESSIONS_ACTIVE.dec();
        }
    }

    fn registry_read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<SessionId, Arc<SessionEntry>>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }
}
