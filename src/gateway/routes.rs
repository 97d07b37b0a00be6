//! HTTP route handlers.
//!
//! This module defines the HTTP API surface of the gateway, translating
//! subresource requests into backend range queries and formatting responses.

use crate::{
    config::ApiConfig,
    error::GatewayError,
    format::Format,
    gateway::state::AppState,
    query::ResourceIdentity,
};
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use tracing::{error, warn};

/// Creates the router for the configured API group, version and resource.
///
/// The discovery routes are only registered when `api.discovery_enabled` is set.
pub fn create_router(api: &ApiConfig) -> Router<AppState> {
    let base = format!("/apis/{}/{}", api.group, api.version);
    let metrics_path = format!(
        "{base}/namespaces/{{namespace}}/{}/{{name}}/{{metrics}}",
        api.resource
    );

    let router = Router::new()
        .route(&metrics_path, get(handle_metrics))
        .route("/healthz", get(handle_health));

    if api.discovery_enabled {
        router
            .route(&base, get(handle_discovery))
            .route(&format!("{base}/"), get(handle_discovery))
    } else {
        router
    }
}

fn negotiate(headers: &HeaderMap) -> Result<Format, GatewayError> {
    Format::negotiate(
        headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok()),
    )
}

/// Handles `GET .../namespaces/{namespace}/{resource}/{name}/{metrics}` by running
/// a range query for the metric, scoped to the named resource.
pub async fn handle_metrics(
    State(state): State<AppState>,
    Path((namespace, name, metric_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let format = negotiate(&headers)?;

    let identity = ResourceIdentity {
        namespace,
        name,
        metric_name,
    };
    let query = state.query_builder.build(&identity, chrono::Utc::now());

    let result = tokio::time::timeout(state.backend_deadline, state.backend.query_range(&query))
        .await
        .unwrap_or_else(|_| Err(GatewayError::BackendTimeout))
        .inspect_err(|e| {
            error!(
                namespace = %identity.namespace,
                name = %identity.name,
                metric = %identity.metric_name,
                status = %e.status_code(),
                "Range query failed: {}",
                e
            );
        })?;

    if !result.warnings.is_empty() {
        warn!(
            namespace = %identity.namespace,
            name = %identity.name,
            metric = %identity.metric_name,
            warnings = ?result.warnings,
            "Backend returned warnings"
        );
    }

    let body = format.serialize(&result)?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    ))
}

/// Handles `GET /apis/{group}/{version}/` with the static discovery document.
pub async fn handle_discovery(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, GatewayError> {
    let format = negotiate(&headers)?;
    let body = format.serialize(state.discovery.as_ref())?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, format.content_type())],
        body,
    ))
}

#[derive(Serialize)]
struct HealthResponse {
    healthy: bool,
}

/// Handles `GET /healthz` by probing the backend.
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let healthy = state.backend.health().await;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(HealthResponse { healthy }))
}
