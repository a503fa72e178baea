use std::sync::Arc;

use swarmcast_core::{Aggregator, Config, SessionManager, StreamTool, SwarmEngine};

/// Shared application state
pub struct AppState {
    config: Config,
    aggregator: Arc<Aggregator>,
    sessions: Arc<SessionManager>,
    engine: Arc<dyn SwarmEngine>,
    stream_tool: Arc<dyn StreamTool>,
}

impl AppState {
    pub fn new(
        config: Config,
        aggregator: Arc<Aggregator>,
        sessions: Arc<SessionManager>,
        engine: Arc<dyn SwarmEngine>,
        stream_tool: Arc<dyn StreamTool>,
    ) -> Self {
        Self {
            config,
            aggregator,
            sessions,
            engine,
            stream_tool,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn engine(&self) -> &dyn SwarmEngine {
        self.engine.as_ref()
    }

    pub fn stream_tool(&self) -> &dyn StreamTool {
        self.stream_tool.as_ref()
    }
}
