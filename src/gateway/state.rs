use std::sync::Arc;
use std::time::Duration;

use crate::{
    Config,
    client::PrometheusClient,
    gateway::discovery::DiscoveryDocument,
    query::QueryBuilder,
};

/// Shared application state available to all request handlers.
///
/// Read-only after startup; cloning only bumps reference counts.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub backend: PrometheusClient,
    pub query_builder: QueryBuilder,
    pub discovery: Arc<DiscoveryDocument>,
    /// Upper bound on a single backend call, always short of the write timeout.
    pub backend_deadline: Duration,
}

impl AppState {
    pub fn new(backend: PrometheusClient) -> Self {
        let config = Config::default();
        Self {
            query_builder: QueryBuilder::new(config.window),
            discovery: Arc::new(DiscoveryDocument::from_config(&config.api)),
            backend_deadline: backend_deadline(&config),
            config: Arc::new(config),
            backend,
        }
    }

    /// Replaces the configuration along with everything derived from it.
    pub fn with_config(mut self, config: Config) -> Self {
        self.query_builder = QueryBuilder::new(config.window);
        self.discovery = Arc::new(DiscoveryDocument::from_config(&config.api));
        self.backend_deadline = backend_deadline(&config);
        self.config = Arc::new(config);
        self
    }
}

fn backend_deadline(config: &Config) -> Duration {
    config
        .backend
        .request_timeout
        .min(config.server.backend_deadline())
}
