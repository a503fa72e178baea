//! Stream session lifecycle integration tests.
//!
//! These tests drive sessions through the manager with mock collaborators:
//! joining -> awaiting_metadata -> file_selected -> transcoding -> ended

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;

use swarmcast_core::{
    config::SearchConfig,
    content::{ContentItem, ContentKind, KindFilter},
    testing::{fixtures, MockCrawler, MockSwarmEngine, MockTranscoder},
    Aggregator, EndReason, SessionError, SessionManager, SessionState,
};

struct TestHarness {
    item: ContentItem,
    engine: Arc<MockSwarmEngine>,
    transcoder: Arc<MockTranscoder>,
    manager: Arc<SessionManager>,
}

impl TestHarness {
    fn new(engine: MockSwarmEngine, transcoder: MockTranscoder) -> Self {
        Self::with_timeout(engine, transcoder, Duration::from_secs(5))
    }

    fn with_timeout(
        engine: MockSwarmEngine,
        transcoder: MockTranscoder,
        join_timeout: Duration,
    ) -> Self {
        let item = fixtures::movie("yts", "The Avengers", 2012, 120);
        let crawler = MockCrawler::new("yts", &[ContentKind::Movie])
            .with_results(vec![item.clone()])
            .with_trending(vec![item.clone()]);
        let aggregator = Arc::new(Aggregator::new(
            vec![Arc::new(crawler)],
            SearchConfig::default(),
        ));

        let engine = Arc::new(engine);
        let transcoder = Arc::new(transcoder);
        let manager = SessionManager::new(
            aggregator,
            engine.clone(),
            transcoder.clone(),
            join_timeout,
        );

        Self {
            item,
            engine,
            transcoder,
            manager,
        }
    }

    fn streaming() -> Self {
        Self::new(
            MockSwarmEngine::new().with_files(fixtures::movie_files()),
            MockTranscoder::new()
                .with_chunks(vec![b"ftyp".to_vec(), b"moof".to_vec()])
                .held_open(),
        )
    }

    /// Poll until the session has left the registry.
    async fn wait_gone(&self, id: &str) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while self.manager.state(id).is_some() {
            assert!(
                tokio::time::Instant::now() < deadline,
                "session {} never ended",
                id
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[tokio::test]
async fn test_session_walks_states_and_streams_bytes() {
    let h = TestHarness::streaming();

    let pending = h.manager.create_session(&h.item.id, 0);
    let mut stream = pending.ready.await.unwrap().unwrap();
    assert_eq!(stream.session_id(), pending.id);

    assert_eq!(
        h.manager.state(&pending.id),
        Some(SessionState::Transcoding)
    );
    let snapshot = h.manager.info(&pending.id).unwrap();
    assert_eq!(
        snapshot.history,
        vec!["joining", "awaiting_metadata", "file_selected", "transcoding"]
    );
    assert_eq!(snapshot.content_id, h.item.id);
    // The feature, not the sample.
    assert_eq!(snapshot.selected_file.unwrap().index, 2);

    assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"ftyp");
    assert_eq!(stream.next().await.unwrap().unwrap().as_ref(), b"moof");

    let magnet = h.item.source_refs[0].magnet_uri.clone().unwrap();
    assert_eq!(h.engine.joined_magnets(), vec![magnet]);
    assert_eq!(h.engine.handles()[0].readers_opened(), 1);
}

#[tokio::test]
async fn test_client_disconnect_releases_everything_once() {
    let h = TestHarness::streaming();
    let pending = h.manager.create_session(&h.item.id, 0);
    let stream = pending.ready.await.unwrap().unwrap();

    drop(stream);
    // The kill is issued before drop returns.
    assert_eq!(h.transcoder.kill_count(), 1);
    assert!(h.manager.info(&pending.id).is_none());

    let ended = h.manager.wait_ended(&pending.id).await.unwrap();
    assert_eq!(ended.end_reason, Some(EndReason::ClientDisconnected));
    assert_eq!(h.engine.destroy_count(), 1);
    assert_eq!(h.transcoder.kill_count(), 1);
    assert_eq!(h.manager.active_count(), 0);
    assert!(h.manager.state(&pending.id).is_none());
}

#[tokio::test]
async fn test_stop_is_idempotent() {
    let h = TestHarness::streaming();
    let pending = h.manager.create_session(&h.item.id, 0);
    let mut stream = pending.ready.await.unwrap().unwrap();

    assert!(h.manager.stop_session(&pending.id));
    assert!(!h.manager.stop_session(&pending.id));
    assert!(!h.manager.stop_session("no-such-session"));

    // Output drains and ends once the transcode is killed.
    while stream.next().await.is_some() {}
    drop(stream);
    h.wait_gone(&pending.id).await;

    assert!(!h.manager.stop_session(&pending.id));
    assert_eq!(h.engine.destroy_count(), 1);
    assert_eq!(h.transcoder.kill_count(), 1);
}

#[tokio::test]
async fn test_concurrent_teardown_triggers_have_one_winner() {
    let h = TestHarness::streaming();
    let pending = h.manager.create_session(&h.item.id, 0);
    let stream = pending.ready.await.unwrap().unwrap();

    let stops: Vec<_> = (0..8)
        .map(|_| {
            let manager = h.manager.clone();
            let id = pending.id.clone();
            tokio::spawn(async move { manager.stop_session(&id) })
        })
        .collect();
    drop(stream);

    let mut winners = 0;
    for stop in stops {
        if stop.await.unwrap() {
            winners += 1;
        }
    }
    // Either one stop won, or the disconnect beat them all.
    assert!(winners <= 1);

    h.wait_gone(&pending.id).await;
    assert_eq!(h.engine.destroy_count(), 1);
    assert_eq!(h.transcoder.kill_count(), 1);
}

#[tokio::test]
async fn test_completed_transcode_ends_session() {
    let h = TestHarness::new(
        MockSwarmEngine::new().with_files(fixtures::movie_files()),
        MockTranscoder::new().with_chunks(vec![b"a".to_vec(), b"b".to_vec()]),
    );
    let pending = h.manager.create_session(&h.item.id, 0);
    let stream = pending.ready.await.unwrap().unwrap();

    let chunks: Vec<_> = stream.map(|c| c.unwrap()).collect().await;
    assert_eq!(chunks.concat(), b"ab");

    let ended = h.manager.wait_ended(&pending.id).await.unwrap();
    assert_eq!(ended.end_reason, Some(EndReason::Completed));
    assert_eq!(ended.state, "ended");
    assert_eq!(ended.history.last().map(String::as_str), Some("ended"));
    assert_eq!(h.engine.destroy_count(), 1);
}

#[tokio::test]
async fn test_transcode_failure_mid_stream_ends_session() {
    let h = TestHarness::new(
        MockSwarmEngine::new().with_files(fixtures::movie_files()),
        MockTranscoder::new()
            .with_chunks(vec![b"a".to_vec()])
            .with_exit_failure(),
    );
    let pending = h.manager.create_session(&h.item.id, 0);
    let mut stream = pending.ready.await.unwrap().unwrap();

    assert!(stream.next().await.unwrap().is_ok());
    assert!(stream.next().await.unwrap().is_err());

    let ended = h.manager.wait_ended(&pending.id).await.unwrap();
    assert_eq!(ended.end_reason, Some(EndReason::TranscodeFailed));
    assert_eq!(h.engine.destroy_count(), 1);
    drop(stream);
}

#[tokio::test]
async fn test_start_offset_reaches_transcoder() {
    let h = TestHarness::streaming();
    let pending = h.manager.create_session(&h.item.id, 95);
    let _stream = pending.ready.await.unwrap().unwrap();

    assert_eq!(h.transcoder.start_offsets(), vec![95]);
    assert_eq!(h.manager.info(&pending.id).unwrap().start_offset_seconds, 95);
}

#[tokio::test]
async fn test_unknown_content_is_not_found() {
    let h = TestHarness::streaming();
    let pending = h.manager.create_session("yts_deadbeef", 0);

    let err = pending.ready.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::ContentNotFound(_)));
    assert!(h.engine.joined_magnets().is_empty());
    h.wait_gone(&pending.id).await;
}

#[tokio::test]
async fn test_join_timeout_is_swarm_unreachable() {
    let h = TestHarness::with_timeout(
        MockSwarmEngine::new()
            .with_files(fixtures::movie_files())
            .with_join_delay(Duration::from_secs(30)),
        MockTranscoder::new(),
        Duration::from_millis(50),
    );
    let pending = h.manager.create_session(&h.item.id, 0);

    let err = pending.ready.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::SwarmUnreachable(_)));
    assert!(h.transcoder.processes().is_empty());
}

#[tokio::test]
async fn test_metadata_timeout_destroys_joined_swarm() {
    let h = TestHarness::with_timeout(
        MockSwarmEngine::new()
            .with_files(fixtures::movie_files())
            .with_metadata_delay(Duration::from_secs(30)),
        MockTranscoder::new(),
        Duration::from_millis(50),
    );
    let pending = h.manager.create_session(&h.item.id, 0);

    let err = pending.ready.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::SwarmUnreachable(_)));
    h.wait_gone(&pending.id).await;
    assert_eq!(h.engine.destroy_count(), 1);
}

#[tokio::test]
async fn test_join_failure_is_swarm_unreachable() {
    let h = TestHarness::new(
        MockSwarmEngine::new().with_join_failure(),
        MockTranscoder::new(),
    );
    let pending = h.manager.create_session(&h.item.id, 0);

    let err = pending.ready.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::SwarmUnreachable(_)));
    assert_eq!(h.engine.destroy_count(), 0);
}

#[tokio::test]
async fn test_empty_torrent_has_no_playable_file() {
    let h = TestHarness::new(MockSwarmEngine::new(), MockTranscoder::new());
    let pending = h.manager.create_session(&h.item.id, 0);

    let err = pending.ready.await.unwrap().unwrap_err();
    assert_eq!(err, SessionError::NoPlayableFile);
    h.wait_gone(&pending.id).await;
    assert_eq!(h.engine.destroy_count(), 1);
}

#[tokio::test]
async fn test_transcoder_start_failure_releases_swarm() {
    let h = TestHarness::new(
        MockSwarmEngine::new().with_files(fixtures::movie_files()),
        MockTranscoder::new().with_start_failure("ffmpeg not found"),
    );
    let pending = h.manager.create_session(&h.item.id, 0);

    let err = pending.ready.await.unwrap().unwrap_err();
    assert!(matches!(err, SessionError::TranscodeFailed(_)));
    h.wait_gone(&pending.id).await;
    assert_eq!(h.engine.destroy_count(), 1);
}

#[tokio::test]
async fn test_stop_while_awaiting_metadata_cancels_startup() {
    let h = TestHarness::new(
        MockSwarmEngine::new()
            .with_files(fixtures::movie_files())
            .with_metadata_delay(Duration::from_secs(30)),
        MockTranscoder::new(),
    );
    let pending = h.manager.create_session(&h.item.id, 0);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while h.manager.state(&pending.id) != Some(SessionState::AwaitingMetadata) {
        assert!(tokio::time::Instant::now() < deadline);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert!(h.manager.stop_session(&pending.id));
    let err = pending.ready.await.unwrap().unwrap_err();
    assert_eq!(err, SessionError::Cancelled);

    h.wait_gone(&pending.id).await;
    assert_eq!(h.engine.destroy_count(), 1);
    assert!(h.transcoder.processes().is_empty());
}

#[tokio::test]
async fn test_abandoned_startup_is_cancelled() {
    let h = TestHarness::new(
        MockSwarmEngine::new()
            .with_files(fixtures::movie_files())
            .with_metadata_delay(Duration::from_secs(30)),
        MockTranscoder::new(),
    );
    let pending = h.manager.create_session(&h.item.id, 0);
    let id = pending.id.clone();
    tokio::time::sleep(Duration::from_millis(20)).await;

    drop(pending);
    h.wait_gone(&id).await;
    assert_eq!(h.engine.destroy_count(), 1);
}

#[tokio::test]
async fn test_magnet_resolved_through_producing_crawler() {
    let mut item = fixtures::movie("1337x", "Heat", 1995, 40);
    item.source_refs[0].magnet_uri = None;
    item.source_refs[0].details_url = Some("https://1337x.example/torrent/1/heat/".to_string());

    let crawler = MockCrawler::new("1337x", &[ContentKind::Movie])
        .with_results(vec![item.clone()])
        .with_magnet("magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567");
    let aggregator = Arc::new(Aggregator::new(
        vec![Arc::new(crawler)],
        SearchConfig::default(),
    ));
    aggregator.search_all("heat", KindFilter::Movie, 1, None).await;

    let engine = Arc::new(MockSwarmEngine::new().with_files(fixtures::movie_files()));
    let manager = SessionManager::new(
        aggregator,
        engine.clone(),
        Arc::new(MockTranscoder::new().held_open()),
        Duration::from_secs(5),
    );

    let pending = manager.create_session(&item.id, 0);
    let _stream = pending.ready.await.unwrap().unwrap();
    assert_eq!(
        engine.joined_magnets(),
        vec!["magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567"]
    );
    let snapshot = manager.info(&pending.id).unwrap();
    assert_eq!(
        snapshot.info_hash.as_deref(),
        Some("0123456789abcdef0123456789abcdef01234567")
    );
}

#[tokio::test]
async fn test_list_and_shutdown_all() {
    let h = TestHarness::streaming();
    let a = h.manager.create_session(&h.item.id, 0);
    let b = h.manager.create_session(&h.item.id, 30);
    let _stream_a = a.ready.await.unwrap().unwrap();
    let _stream_b = b.ready.await.unwrap().unwrap();

    let listed = h.manager.list();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|s| s.state == "transcoding"));
    assert_eq!(h.manager.active_count(), 2);

    h.manager.shutdown_all().await;

    assert!(h.manager.list().is_empty());
    assert_eq!(h.manager.active_count(), 0);
    assert_eq!(h.engine.destroy_count(), 2);
    assert_eq!(h.transcoder.kill_count(), 2);
}

#[tokio::test]
async fn test_search_then_stream_end_to_end() {
    let h = TestHarness::streaming();
    let aggregator = Aggregator::new(
        vec![Arc::new(
            MockCrawler::new("yts", &[ContentKind::Movie]).with_results(vec![h.item.clone()]),
        )],
        SearchConfig::default(),
    );

    let results = aggregator
        .search_all("avengers", KindFilter::Movie, 1, None)
        .await;
    let hit = results
        .iter()
        .find(|i| i.title.to_lowercase().contains("avengers"))
        .unwrap();
    assert!(!hit.source_refs.is_empty());

    let pending = h.manager.create_session(&hit.id, 0);
    let mut stream = pending.ready.await.unwrap().unwrap();
    assert!(!stream.next().await.unwrap().unwrap().is_empty());
}
