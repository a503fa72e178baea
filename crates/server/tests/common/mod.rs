//! Common test utilities for API testing with mocks.
//!
//! This module provides a test fixture that builds the router in-process
//! with mock crawlers, swarm engine, transcoder and stream tool injected,
//! so no network, ffmpeg or streamlink is needed.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use swarmcast_core::{
    content::{ContentItem, ContentKind},
    testing::{MockCrawler, MockStreamTool, MockSwarmEngine, MockTranscoder},
    Aggregator, Config, SessionManager,
};

/// Re-export fixtures for test convenience
pub use swarmcast_core::testing::fixtures;

/// Test fixture for API testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_search() {
///     let fixture = TestFixture::new();
///     let response = fixture.get("/search?q=avengers").await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock crawlers, in registration order
    pub crawlers: Vec<Arc<MockCrawler>>,
    /// Mock swarm engine - inspect joins and destroys
    pub engine: Arc<MockSwarmEngine>,
    /// Mock transcoder - inspect starts and kills
    pub transcoder: Arc<MockTranscoder>,
    /// Mock companion stream tool
    pub stream_tool: Arc<MockStreamTool>,
    pub sessions: Arc<SessionManager>,
    /// The movie served by the default yts crawler
    pub movie: ContentItem,
    /// The show served by the default eztv crawler
    pub show: ContentItem,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Mocks the fixture is built from.
pub struct TestConfig {
    pub crawlers: Option<Vec<MockCrawler>>,
    pub engine: MockSwarmEngine,
    pub transcoder: MockTranscoder,
    pub stream_tool: MockStreamTool,
    pub join_timeout: Duration,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            crawlers: None,
            engine: MockSwarmEngine::new().with_files(fixtures::movie_files()),
            transcoder: MockTranscoder::new()
                .with_chunks(vec![b"ftyp".to_vec(), b"moov".to_vec(), b"moof".to_vec()]),
            stream_tool: MockStreamTool::new(),
            join_timeout: Duration::from_secs(5),
        }
    }
}

impl TestConfig {
    /// Transcoder output that stays open until the session is torn down.
    pub fn live() -> Self {
        Self {
            transcoder: MockTranscoder::new()
                .with_chunks(vec![b"ftyp".to_vec()])
                .held_open(),
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub fn new() -> Self {
        Self::with_config(TestConfig::default())
    }

    /// Create a test fixture with custom mocks.
    pub fn with_config(test_config: TestConfig) -> Self {
        let movie = fixtures::movie("yts", "The Avengers", 2012, 120);
        let show = fixtures::show("eztv", "Severance", 2022, 80);

        let crawlers: Vec<Arc<MockCrawler>> = test_config
            .crawlers
            .unwrap_or_else(|| {
                vec![
                    MockCrawler::new("yts", &[ContentKind::Movie])
                        .with_results(vec![movie.clone()])
                        .with_trending(vec![movie.clone()]),
                    MockCrawler::new("eztv", &[ContentKind::Tv])
                        .with_results(vec![show.clone()])
                        .with_trending(vec![show.clone()]),
                ]
            })
            .into_iter()
            .map(Arc::new)
            .collect();

        let config = Config::default();
        let aggregator = Arc::new(Aggregator::new(
            crawlers
                .iter()
                .map(|c| Arc::clone(c) as Arc<dyn swarmcast_core::Crawler>)
                .collect(),
            config.search.clone(),
        ));

        let engine = Arc::new(test_config.engine);
        let transcoder = Arc::new(test_config.transcoder);
        let stream_tool = Arc::new(test_config.stream_tool);

        let sessions = SessionManager::new(
            aggregator.clone(),
            engine.clone(),
            transcoder.clone(),
            test_config.join_timeout,
        );

        let state = Arc::new(swarmcast_server::state::AppState::new(
            config,
            aggregator,
            Arc::clone(&sessions),
            engine.clone(),
            stream_tool.clone(),
        ));

        let router = swarmcast_server::api::create_router(state);

        Self {
            router,
            crawlers,
            engine,
            transcoder,
            stream_tool,
            sessions,
            movie,
            show,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a GET request and hand back the unread response.
    ///
    /// Used for `/stream`, whose body may never end on its own.
    pub async fn get_raw(&self, path: &str) -> Response<Body> {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request")
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Poll until a condition on the fixture holds.
    ///
    /// Session release runs on a spawned task, so effects such as swarm
    /// teardown land shortly after the response.
    pub async fn wait_until(&self, condition: impl Fn(&Self) -> bool) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !condition(self) {
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition never held"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// Read a whole response body, failing the test if it never ends.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    tokio::time::timeout(Duration::from_secs(5), response.into_body().collect())
        .await
        .expect("body never ended")
        .expect("Failed to collect body")
        .to_bytes()
        .to_vec()
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
