//! Gateway server initialization and lifecycle management.
//!
use crate::{
    client::PrometheusClient,
    config::Config,
    gateway::{routes::create_router, server::Transport, state::AppState},
};
use axum::{Router, http::StatusCode};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub mod discovery;
pub mod routes;
pub mod server;
pub mod state;
pub mod tls;

/// Builds the complete application: routes, middleware and shared state.
///
/// Every response must be produced within the configured write timeout.
/// Backend calls are cut off earlier (see [`AppState::backend_deadline`]),
/// so a slow backend answers 504 rather than the router's 408.
pub fn build_app(state: AppState) -> Router {
    let write_timeout = state.config.server.write_timeout;

    create_router(&state.config.api)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            write_timeout,
        ))
        // Failed requests are logged by their handler.
        .layer(TraceLayer::new_for_http().on_failure(()))
        .with_state(state)
}

/// Starts the gateway server.
///
/// This function:
/// 1. Initializes tracing with environment-based log filtering
/// 2. Loads configuration from environment variables
/// 3. Builds the metrics backend client
/// 4. Loads the TLS key pair when TLS is configured
/// 5. Binds to the configured address and serves HTTP requests
///
/// # Errors
///
/// Returns an error if:
/// - The configuration is invalid
/// - The TLS certificate or key cannot be loaded
/// - The TCP listener cannot bind to the configured address
pub async fn run() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("subresource_gateway=info".parse()?),
        )
        .init();

    let config = Config::from_env()?;

    let backend = PrometheusClient::new(&config.backend)?;
    info!(
        "Using metrics backend at {} (request_timeout={:?})",
        backend.base_url(),
        config.backend.request_timeout
    );

    let transport = Transport::from_config(config.server.tls.as_ref())?;

    info!(
        "Serving {} for {} ({} subresources, discovery={})",
        config.api.resource,
        config.api.group_version(),
        config.api.subresources.len(),
        config.api.discovery_enabled
    );

    let listener = TcpListener::bind(config.server.listen_addr).await?;
    info!(
        "Listening on {}://{}",
        transport.scheme(),
        config.server.listen_addr
    );

    let server_config = config.server.clone();
    let app = build_app(AppState::new(backend).with_config(config));

    server::serve(listener, app, transport, &server_config).await;
    Ok(())
}
