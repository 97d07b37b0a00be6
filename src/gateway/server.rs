//! Connection handling for plain and TLS listeners.
//!
//! Both transports share one accept loop; they differ only in whether the
//! accepted stream goes through a TLS handshake before hyper sees it.

use std::net::SocketAddr;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error};

use crate::config::{ServerConfig, TlsConfig};
use crate::error::GatewayError;
use crate::gateway::tls;

/// How accepted connections are wrapped before HTTP is spoken on them.
#[derive(Clone)]
pub enum Transport {
    Plain,
    Tls(TlsAcceptor),
}

impl Transport {
    /// Plain when no TLS files are configured, otherwise TLS with the loaded key pair.
    pub fn from_config(tls: Option<&TlsConfig>) -> Result<Self, GatewayError> {
        match tls {
            Some(tls) => Ok(Transport::Tls(tls::build_acceptor(tls)?)),
            None => Ok(Transport::Plain),
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Transport::Plain => "http",
            Transport::Tls(_) => "https",
        }
    }
}

/// Connection builder carrying the per-connection limits from `server`.
pub fn connection_builder(server: &ServerConfig) -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(server.read_timeout)
        .max_buf_size(server.max_header_bytes);
    builder
        .http2()
        .timer(TokioTimer::new())
        .max_header_list_size(u32::try_from(server.max_header_bytes).unwrap_or(u32::MAX));
    builder
}

/// Accepts connections on `listener` forever, serving each on its own task.
///
/// Accept failures are logged and the loop keeps going; failures on a single
/// connection never affect the others.
pub async fn serve(listener: TcpListener, app: Router, transport: Transport, server: &ServerConfig) {
    let builder = connection_builder(server);
    let handshake_timeout = server.read_timeout;

    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let builder = builder.clone();
        let transport = transport.clone();
        let app = app.clone();

        tokio::spawn(async move {
            serve_connection(stream, remote_addr, builder, transport, app, handshake_timeout).await;
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    builder: auto::Builder<TokioExecutor>,
    transport: Transport,
    app: Router,
    handshake_timeout: std::time::Duration,
) {
    // Dropping the connection future on client disconnect also drops any
    // in-flight handler, which cancels its backend request.
    let service = TowerToHyperService::new(app);

    let result = match transport {
        Transport::Plain => builder.serve_connection(TokioIo::new(stream), service).await,
        Transport::Tls(acceptor) => {
            match tokio::time::timeout(handshake_timeout, acceptor.accept(stream)).await {
                Ok(Ok(tls_stream)) => {
                    builder
                        .serve_connection(TokioIo::new(tls_stream), service)
                        .await
                }
                Ok(Err(e)) => {
                    debug!(%remote_addr, "TLS handshake failed: {}", e);
                    return;
                }
                Err(_) => {
                    debug!(%remote_addr, "TLS handshake timed out");
                    return;
                }
            }
        }
    };

    if let Err(e) = result {
        debug!(%remote_addr, "Connection closed with error: {}", e);
    }
}
