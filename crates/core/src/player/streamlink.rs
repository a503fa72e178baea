//! streamlink-backed companion streams.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::metrics;
use crate::process::{ProcessExit, SupervisedProcess};

use super::{CompanionStream, PlayerError, StreamTool};

struct ActiveStream {
    info: CompanionStream,
    process: Arc<SupervisedProcess>,
}

type StreamMap = Arc<Mutex<HashMap<String, ActiveStream>>>;

/// Runs one `streamlink` process per companion stream.
pub struct StreamlinkTool {
    config: PlayerConfig,
    streams: StreamMap,
}

impl StreamlinkTool {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            streams: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Arguments for serving `url` over HTTP on `port`.
    pub fn build_args(url: &str, quality: &str, port: u16) -> Vec<String> {
        let mut args = vec![url.to_string(), quality.to_string()];
        args.extend(
            [
                "--player-external-http",
                "--player-external-http-port",
                &port.to_string(),
                "--hls-live-edge",
                "5",
                "--stream-segment-threads",
                "3",
                "--stream-timeout",
                "60",
                "--retry-streams",
                "1",
                "--retry-open",
                "3",
            ]
            .map(String::from),
        );
        args
    }

    /// First port of the configured range not held by a running stream.
    fn allocate_port(&self, streams: &HashMap<String, ActiveStream>) -> Result<u16, PlayerError> {
        let start = self.config.port_range_start;
        (0..self.config.max_streams)
            .filter_map(|offset| start.checked_add(offset))
            .find(|port| streams.values().all(|s| s.info.port != *port))
            .ok_or(PlayerError::NoFreePort(self.config.max_streams))
    }

    fn spawn_error(&self, e: std::io::Error) -> PlayerError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PlayerError::ToolNotFound {
                path: self.config.streamlink_path.display().to_string(),
            }
        } else {
            PlayerError::Io(e)
        }
    }

    fn spawn_log_reader(id: String, stderr: ChildStderr) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(stream_id = %id, line = %line, "streamlink");
            }
        });
    }

    /// Drops the stream from the map when its process ends on its own.
    fn spawn_exit_watcher(id: String, process: Arc<SupervisedProcess>, streams: StreamMap) {
        tokio::spawn(async move {
            let exit = process.wait().await;
            let removed = {
                let mut streams = streams.lock().unwrap_or_else(PoisonError::into_inner);
                match streams.get(&id) {
                    Some(active) if Arc::ptr_eq(&active.process, &process) => streams.remove(&id),
                    _ => None,
                }
            };
            if removed.is_some() {
                metrics::COMPANION_STREAMS_ACTIVE.dec();
                match exit {
                    ProcessExit::Exited(status) if status.success() => {
                        info!(stream_id = %id, "Companion stream ended")
                    }
                    other => warn!(stream_id = %id, exit = ?other, "Companion stream exited"),
                }
            }
        });
    }

    fn lock_streams(&self) -> std::sync::MutexGuard<'_, HashMap<String, ActiveStream>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Quality labels from `streamlink --json` output.
pub(crate) fn parse_qualities(json: &str) -> Result<Vec<String>, PlayerError> {
    let value: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| PlayerError::ProbeFailed(format!("invalid JSON: {}", e)))?;

    if let Some(error) = value.get("error").and_then(|e| e.as_str()) {
        return Err(PlayerError::ProbeFailed(error.to_string()));
    }

    value
        .get("streams")
        .and_then(|s| s.as_object())
        .map(|streams| streams.keys().cloned().collect())
        .ok_or_else(|| PlayerError::ProbeFailed("no streams in probe output".to_string()))
}

#[async_trait]
impl StreamTool for StreamlinkTool {
    fn name(&self) -> &str {
        "streamlink"
    }

    async fn start_stream(
        &self,
        url: &str,
        quality: Option<&str>,
    ) -> Result<CompanionStream, PlayerError> {
        let url = url.trim();
        if url.is_empty() || url.starts_with('-') {
            return Err(PlayerError::InvalidUrl(url.to_string()));
        }
        let quality = quality.unwrap_or(&self.config.quality).to_string();
        let id = uuid::Uuid::new_v4().simple().to_string();

        // Held across spawn so two starts cannot claim the same port.
        let (info, process) = {
            let mut streams = self.lock_streams();
            let port = self.allocate_port(&streams)?;

            let mut child = Command::new(&self.config.streamlink_path)
                .args(Self::build_args(url, &quality, port))
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| self.spawn_error(e))?;

            if let Some(stderr) = child.stderr.take() {
                Self::spawn_log_reader(id.clone(), stderr);
            }
            let process = Arc::new(SupervisedProcess::supervise("streamlink", child));

            let info = CompanionStream {
                id: id.clone(),
                url: url.to_string(),
                quality,
                port,
                local_url: format!("http://{}:{}/", self.config.host, port),
                started_at: Utc::now(),
            };
            streams.insert(
                id.clone(),
                ActiveStream {
                    info: info.clone(),
                    process: process.clone(),
                },
            );
            (info, process)
        };

        metrics::COMPANION_STREAMS_ACTIVE.inc();
        Self::spawn_exit_watcher(id.clone(), process, self.streams.clone());

        info!(stream_id = %id, url = %info.url, port = info.port, "Companion stream started");
        Ok(info)
    }

    async fn stop_stream(&self, id: &str) -> bool {
        let Some(active) = self.lock_streams().remove(id) else {
            return false;
        };
        metrics::COMPANION_STREAMS_ACTIVE.dec();
        let exit = active.process.kill().await;
        info!(stream_id = %id, exit = ?exit, "Companion stream stopped");
        true
    }

    fn list_streams(&self) -> Vec<CompanionStream> {
        let mut list: Vec<CompanionStream> =
            self.lock_streams().values().map(|s| s.info.clone()).collect();
        list.sort_by_key(|s| s.port);
        list
    }

    async fn list_qualities(&self, url: &str) -> Result<Vec<String>, PlayerError> {
        let url = url.trim();
        if url.is_empty() || url.starts_with('-') {
            return Err(PlayerError::InvalidUrl(url.to_string()));
        }

        let mut child = Command::new(&self.config.streamlink_path)
            .args(["--json", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| PlayerError::ProbeFailed("stdout unavailable".to_string()))?;
        let process = SupervisedProcess::supervise("streamlink-probe", child);

        let timeout = Duration::from_secs(self.config.probe_timeout_secs);
        let probe = async {
            let mut output = String::new();
            stdout.read_to_string(&mut output).await?;
            Ok::<_, std::io::Error>((output, process.wait().await))
        };

        let (output, exit) = match tokio::time::timeout(timeout, probe).await {
            Ok(result) => result?,
            Err(_) => {
                process.kill().await;
                warn!(url = %url, "Quality probe timed out");
                return Err(PlayerError::ProbeTimeout(self.config.probe_timeout_secs));
            }
        };

        // streamlink reports unsupported URLs as JSON with a non-zero exit.
        if output.trim().is_empty() && !exit.is_success() {
            return Err(PlayerError::ProbeFailed(format!(
                "streamlink exited with {:?}",
                exit
            )));
        }
        parse_qualities(&output)
    }

    async fn shutdown_all(&self) {
        let drained: Vec<(String, ActiveStream)> = self.lock_streams().drain().collect();
        if drained.is_empty() {
            return;
        }
        info!(count = drained.len(), "Stopping companion streams");
        for (_, active) in &drained {
            active.process.request_kill();
            metrics::COMPANION_STREAMS_ACTIVE.dec();
        }
        for (_, active) in drained {
            active.process.wait().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: &str) -> PlayerConfig {
        PlayerConfig {
            streamlink_path: path.into(),
            port_range_start: 18090,
            max_streams: 2,
            probe_timeout_secs: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_args() {
        let args = StreamlinkTool::build_args("https://example.com/live", "720p", 8091);
        assert_eq!(args[0], "https://example.com/live");
        assert_eq!(args[1], "720p");
        let port = args
            .iter()
            .position(|a| a == "--player-external-http-port")
            .unwrap();
        assert_eq!(args[port + 1], "8091");
        assert!(args.contains(&"--player-external-http".to_string()));
        assert_eq!(args.last().unwrap(), "3");
    }

    #[test]
    fn test_parse_qualities() {
        let json = r#"{"plugin":"twitch","streams":{"720p":{},"480p":{},"best":{},"worst":{}}}"#;
        let mut qualities = parse_qualities(json).unwrap();
        qualities.sort();
        assert_eq!(qualities, vec!["480p", "720p", "best", "worst"]);
    }

    #[test]
    fn test_parse_qualities_error_payload() {
        let json = r#"{"error":"No plugin can handle URL: foo"}"#;
        let err = parse_qualities(json).unwrap_err();
        assert!(matches!(err, PlayerError::ProbeFailed(msg) if msg.contains("No plugin")));
    }

    #[test]
    fn test_parse_qualities_garbage() {
        assert!(parse_qualities("not json").is_err());
        assert!(parse_qualities("{}").is_err());
    }

    #[tokio::test]
    async fn test_missing_tool_is_reported() {
        let tool = StreamlinkTool::new(config("/nonexistent/streamlink"));
        let err = tool.start_stream("https://example.com", None).await.unwrap_err();
        assert!(matches!(err, PlayerError::ToolNotFound { .. }));
        assert!(tool.list_streams().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_flag_like_url() {
        let tool = StreamlinkTool::new(config("streamlink"));
        let err = tool.list_qualities("--help").await.unwrap_err();
        assert!(matches!(err, PlayerError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_stop_unknown_stream_is_noop() {
        let tool = StreamlinkTool::new(config("streamlink"));
        assert!(!tool.stop_stream("missing").await);
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        fn script(body: &str) -> tempfile::TempPath {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "#!/bin/sh\n{}", body).unwrap();
            let path = file.into_temp_path();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_streams_get_distinct_ports_until_exhausted() {
            let tool_path = script("sleep 30");
            let tool = StreamlinkTool::new(config(tool_path.to_str().unwrap()));

            let a = tool.start_stream("https://example.com/a", None).await.unwrap();
            let b = tool.start_stream("https://example.com/b", Some("720p")).await.unwrap();
            assert_eq!(a.port, 18090);
            assert_eq!(b.port, 18091);
            assert_eq!(b.quality, "720p");
            assert_eq!(a.local_url, "http://127.0.0.1:18090/");

            let err = tool.start_stream("https://example.com/c", None).await.unwrap_err();
            assert!(matches!(err, PlayerError::NoFreePort(2)));

            assert!(tool.stop_stream(&a.id).await);
            assert!(!tool.stop_stream(&a.id).await);
            let c = tool.start_stream("https://example.com/c", None).await.unwrap();
            assert_eq!(c.port, 18090);

            tool.shutdown_all().await;
            assert!(tool.list_streams().is_empty());
        }

        #[tokio::test]
        async fn test_exited_stream_is_forgotten() {
            let tool_path = script("exit 1");
            let tool = StreamlinkTool::new(config(tool_path.to_str().unwrap()));
            tool.start_stream("https://example.com", None).await.unwrap();

            for _ in 0..50 {
                if tool.list_streams().is_empty() {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            panic!("exited stream still listed");
        }

        #[tokio::test]
        async fn test_probe_reads_qualities() {
            let tool_path = script(r#"echo '{"streams":{"1080p":{},"best":{}}}'"#);
            let tool = StreamlinkTool::new(config(tool_path.to_str().unwrap()));
            let qualities = tool.list_qualities("https://example.com").await.unwrap();
            assert_eq!(qualities, vec!["1080p", "best"]);
        }

        #[tokio::test]
        async fn test_probe_times_out() {
            let tool_path = script("sleep 30");
            let tool = StreamlinkTool::new(config(tool_path.to_str().unwrap()));
            let err = tool.list_qualities("https://example.com").await.unwrap_err();
            assert!(matches!(err, PlayerError::ProbeTimeout(1)));
        }
    }
}
