//! # Subresource Gateway
//!
//! An HTTP gateway that exposes per-resource metric subresources and answers
//! them with range queries against a Prometheus-compatible backend.
//!
//! ## Quick Start
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> eyre::Result<()> {
//!     subresource_gateway::gateway::run().await
//! }
//! ```
//!
//! ## Configuration
//!
//! The gateway is configured via environment variables:
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `LISTEN_ADDR` | `0.0.0.0:8080` | HTTP server listen address |
//! | `BACKEND_HOST` / `IP` | `127.0.0.1` | Metrics backend host |
//! | `BACKEND_PORT` / `PORT` | `9090` | Metrics backend port |
//! | `TLS_CERT_FILE` / `TLS_KEY_FILE` | unset | Serve over TLS when both are set |
//! | `READ_TIMEOUT_MS` | `10000` | Time allowed to receive request headers |
//! | `WRITE_TIMEOUT_MS` | `10000` | Time allowed to produce a response |
//! | `MAX_HEADER_BYTES` | `1048576` | Maximum request header size |
//! | `API_GROUP` | `subresources.harvester.io` | Served API group |
//! | `API_VERSION` | `v1` | Served API version |
//! | `API_RESOURCE` | `virtualmachineinstances` | Resource carrying the metrics |
//! | `SUBRESOURCES` | KubeVirt VMI metrics | Metric names listed by discovery |
//! | `ENABLE_DISCOVERY` | `true` | Register the discovery route |
//! | `QUERY_RANGE_SECS` | `600` | Length of the queried window |
//! | `QUERY_STEP_SECS` | `1` | Query resolution |
//!
//! ## Endpoints
//!
//! - `GET /apis/{group}/{version}/namespaces/{namespace}/{resource}/{name}/{metric}` -
//!   Range query for `metric` scoped to the named resource
//! - `GET /apis/{group}/{version}/` - Discovery document
//! - `GET /healthz` - Backend health probe

pub mod client;
pub mod config;
pub mod error;
pub mod format;
pub mod gateway;
pub mod query;


pub use config::Config;
pub use error::GatewayError;
pub use format::Format;
