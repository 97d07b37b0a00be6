//! Gateway configuration loaded from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{TimeDelta, Utc};

use crate::error::GatewayError;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_BACKEND_HOST: &str = "127.0.0.1";
const DEFAULT_BACKEND_PORT: u16 = 9090;
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_MAX_HEADER_BYTES: usize = 1 << 20;
const MAX_DEADLINE_MARGIN: Duration = Duration::from_secs(1);

/// Smallest header buffer hyper accepts for HTTP/1 connections.
pub const MIN_HEADER_BYTES: usize = 8192;

/// Metric subresources advertised by the discovery route when `SUBRESOURCES` is unset.
pub const DEFAULT_SUBRESOURCES: &[&str] = &[
    "kubevirt_vmi_network_errors_total",
    "kubevirt_vmi_network_receive_bytes_total",
    "kubevirt_vmi_network_transmit_bytes_total",
    "kubevirt_vmi_memory_resident_bytes",
    "kubevirt_vmi_storage_read_traffic_bytes_total",
    "kubevirt_vmi_storage_write_traffic_bytes_total",
];

/// Metrics backend connection settings.
///
/// # Environment Variables
///
/// - `BACKEND_HOST` - Backend host, falls back to `IP` (default: `127.0.0.1`)
/// - `BACKEND_PORT` - Backend port, falls back to `PORT` (default: `9090`)
///
/// The request timeout is not read separately; it is derived from
/// `WRITE_TIMEOUT_MS` by [`ServerConfig::backend_deadline`].
#[derive(Clone, Debug)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BACKEND_HOST.into(),
            port: DEFAULT_BACKEND_PORT,
            request_timeout: ServerConfig::default().backend_deadline(),
        }
    }
}

impl BackendConfig {
    /// Base address of the backend, `http://<host>:<port>`.
    pub fn address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Certificate and key files used when serving over TLS.
#[derive(Clone, Debug, PartialEq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Listener settings applied uniformly to every connection.
///
/// # Environment Variables
///
/// - `LISTEN_ADDR` - Bind address (default: `0.0.0.0:8080`)
/// - `READ_TIMEOUT_MS` - Time allowed to receive request headers (default: `10000`)
/// - `WRITE_TIMEOUT_MS` - Time allowed to produce a response (default: `10000`)
/// - `MAX_HEADER_BYTES` - Maximum request header size (default: `1048576`)
/// - `TLS_CERT_FILE` / `TLS_KEY_FILE` - PEM files; setting both enables TLS
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_header_bytes: usize,
    pub tls: Option<TlsConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            read_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            write_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            tls: None,
        }
    }
}

/// API surface served by the gateway.
///
/// # Environment Variables
///
/// - `API_GROUP` - API group (default: `subresources.harvester.io`)
/// - `API_VERSION` - API version (default: `v1`)
/// - `API_RESOURCE` - Resource the metrics hang off (default: `virtualmachineinstances`)
/// - `SUBRESOURCES` - Comma separated metric names listed by discovery
/// - `ENABLE_DISCOVERY` - Register the discovery route (default: `true`)
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub group: String,
    pub version: String,
    pub resource: String,
    pub subresources: Vec<String>,
    pub discovery_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            group: "subresources.harvester.io".into(),
            version: "v1".into(),
            resource: "virtualmachineinstances".into(),
            subresources: DEFAULT_SUBRESOURCES.iter().map(|s| s.to_string()).collect(),
            discovery_enabled: true,
        }
    }
}

impl ApiConfig {
    /// `<group>/<version>`, as reported in the discovery document.
    pub fn group_version(&self) -> String {
        format!("{}/{}", self.group, self.version)
    }
}

/// Trailing window every range query covers.
///
/// # Environment Variables
///
/// - `QUERY_RANGE_SECS` - Window length (default: `600`)
/// - `QUERY_STEP_SECS` - Sample resolution (default: `1`)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryWindowConfig {
    range: TimeDelta,
    step: Duration,
}

impl Default for QueryWindowConfig {
    fn default() -> Self {
        Self {
            range: TimeDelta::minutes(10),
            step: Duration::from_secs(1),
        }
    }
}

impl QueryWindowConfig {
    /// Validates that both the range and the step are strictly positive.
    pub fn new(range: Duration, step: Duration) -> Result<Self, GatewayError> {
        if range.is_zero() {
            return Err(GatewayError::Config("query range must be positive".into()));
        }
        if step.is_zero() {
            return Err(GatewayError::Config("query step must be positive".into()));
        }
        let range = TimeDelta::from_std(range)
            .map_err(|e| GatewayError::Config(format!("query range out of bounds: {e}")))?;
        if Utc::now().checked_sub_signed(range).is_none() {
            return Err(GatewayError::Config(format!(
                "query range of {}s reaches past the earliest representable time",
                range.num_seconds()
            )));
        }
        Ok(Self { range, step })
    }

    pub fn range(&self) -> TimeDelta {
        self.range
    }

    pub fn step(&self) -> Duration {
        self.step
    }
}

impl ServerConfig {
    /// How long a backend call may run so the handler still answers within
    /// the write timeout. The margin is a tenth of the write timeout, capped
    /// at one second.
    pub fn backend_deadline(&self) -> Duration {
        let margin = (self.write_timeout / 10).min(MAX_DEADLINE_MARGIN);
        self.write_timeout.saturating_sub(margin)
    }
}

/// Gateway configuration.
///
/// Load from environment with [`Config::from_env`], or use [`Config::default`]
/// for development defaults.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub api: ApiConfig,
    pub window: QueryWindowConfig,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, GatewayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, GatewayError> {
        let listen_addr = lookup("LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.into())
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let read_timeout = Duration::from_millis(parse_or(
            &lookup,
            "READ_TIMEOUT_MS",
            DEFAULT_TIMEOUT_MS,
        )?);
        let write_timeout = Duration::from_millis(parse_or(
            &lookup,
            "WRITE_TIMEOUT_MS",
            DEFAULT_TIMEOUT_MS,
        )?);
        if write_timeout.is_zero() {
            return Err(GatewayError::Config("WRITE_TIMEOUT_MS must be positive".into()));
        }
        let max_header_bytes =
            parse_or(&lookup, "MAX_HEADER_BYTES", DEFAULT_MAX_HEADER_BYTES)?.max(MIN_HEADER_BYTES);

        let tls = match (lookup("TLS_CERT_FILE"), lookup("TLS_KEY_FILE")) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (None, None) => None,
            _ => {
                return Err(GatewayError::Config(
                    "TLS_CERT_FILE and TLS_KEY_FILE must be set together".into(),
                ));
            }
        };

        let host = lookup("BACKEND_HOST")
            .or_else(|| lookup("IP"))
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_BACKEND_HOST.into());
        let port = match lookup("BACKEND_PORT").or_else(|| lookup("PORT")) {
            Some(port) => port
                .parse()
                .map_err(|e| GatewayError::Config(format!("invalid backend port {port:?}: {e}")))?,
            None => DEFAULT_BACKEND_PORT,
        };

        let defaults = ApiConfig::default();
        let api = ApiConfig {
            group: lookup("API_GROUP").unwrap_or(defaults.group),
            version: lookup("API_VERSION").unwrap_or(defaults.version),
            resource: lookup("API_RESOURCE").unwrap_or(defaults.resource),
            subresources: lookup("SUBRESOURCES")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.subresources),
            discovery_enabled: lookup("ENABLE_DISCOVERY")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
        };

        let window = QueryWindowConfig::new(
            Duration::from_secs(parse_or(&lookup, "QUERY_RANGE_SECS", 600)?),
            Duration::from_secs(parse_or(&lookup, "QUERY_STEP_SECS", 1)?),
        )?;

        let server = ServerConfig {
            listen_addr,
            read_timeout,
            write_timeout,
            max_header_bytes,
            tls,
        };
        let backend = BackendConfig {
            host,
            port,
            request_timeout: server.backend_deadline(),
        };

        Ok(Self {
            server,
            backend,
            api,
            window,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, GatewayError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e| GatewayError::Config(format!("invalid {key} {raw:?}: {e}"))),
        None => Ok(default),
    }
}
