//! HTTP client wrapper for the Prometheus-compatible metrics backend.

use crate::config::BackendConfig;
use crate::error::GatewayError;
use crate::format::Format;
use crate::query::RangeQuery;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use sonic_rs::Value;
use tracing::debug;

const QUERY_RANGE_PATH: &str = "api/v1/query_range";
const HEALTH_PATH: &str = "-/healthy";

/// Result of a successful range query, passed through to the caller as-is.
///
/// `warnings` is omitted from the serialized form when the backend sent none.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub result_type: String,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Envelope the backend wraps every API answer in.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    result: Value,
}

/// A client for the backend's range-query API.
///
/// Built once at startup; the underlying connection pool is shared, so the
/// client is cheaply cloneable and safe to share across tasks.
#[derive(Clone, Debug)]
pub struct PrometheusClient {
    http: Client,
    base: Url,
}

impl PrometheusClient {
    /// Builds a client for the backend described by `config`.
    ///
    /// Every request is bounded by `config.request_timeout`.
    pub fn new(config: &BackendConfig) -> Result<Self, GatewayError> {
        let address = config.address();
        let base = Url::parse(&address)
            .map_err(|e| GatewayError::Config(format!("invalid backend address {address}: {e}")))?;
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build backend client: {e}")))?;

        Ok(Self { http, base })
    }

    /// The backend base address.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Runs a range query and returns the backend result with any warnings.
    pub async fn query_range(&self, query: &RangeQuery) -> Result<QueryResult, GatewayError> {
        let url = self.endpoint(QUERY_RANGE_PATH)?;
        debug!(query = %query.query, "Running range query against {}", url);

        let start = query.window.start_param();
        let end = query.window.end_param();
        let step = query.window.step_param();
        let response = self
            .http
            .get(url)
            .query(&[
                ("query", query.query.as_str()),
                ("start", start.as_str()),
                ("end", end.as_str()),
                ("step", step.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        let envelope: ApiResponse = Format::Json.deserialize_owned(&body).map_err(|e| {
            GatewayError::InvalidBackendResponse(format!("HTTP {status}: undecodable body: {e}"))
        })?;

        match envelope.status.as_str() {
            "success" => {
                let data = envelope.data.ok_or_else(|| {
                    GatewayError::InvalidBackendResponse("success without data".into())
                })?;
                Ok(QueryResult {
                    result_type: data.result_type,
                    result: data.result,
                    warnings: envelope.warnings,
                })
            }
            "error" => Err(GatewayError::Backend {
                error_type: envelope.error_type.unwrap_or_else(|| "unknown".into()),
                message: envelope.error.unwrap_or_else(|| format!("HTTP {status}")),
            }),
            other => Err(GatewayError::InvalidBackendResponse(format!(
                "unexpected status {other:?}"
            ))),
        }
    }

    /// Returns true if the backend answers its health probe with a 2xx.
    pub async fn health(&self) -> bool {
        let Ok(url) = self.endpoint(HEALTH_PATH) else {
            return false;
        };
        match self.http.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Backend health probe failed: {}", e);
                false
            }
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        self.base
            .join(path)
            .map_err(|e| GatewayError::Config(format!("invalid backend path {path}: {e}")))
    }
}
