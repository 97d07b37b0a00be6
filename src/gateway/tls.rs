//! TLS acceptor construction from PEM files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;
use crate::error::GatewayError;

/// Loads the certificate chain and private key named by `tls` into an acceptor.
///
/// HTTP/2 and HTTP/1.1 are both offered through ALPN.
pub fn build_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, GatewayError> {
    let mut cert_file = open(&tls.cert_path, "certificate")?;
    let mut key_file = open(&tls.key_path, "private key")?;

    let certs = rustls_pemfile::certs(&mut cert_file)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::Config(format!("failed to read certificate: {e}")))?;

    if certs.is_empty() {
        return Err(GatewayError::Config(format!(
            "no certificate found in {}",
            tls.cert_path.display()
        )));
    }

    let key = rustls_pemfile::private_key(&mut key_file)
        .map_err(|e| GatewayError::Config(format!("failed to read private key: {e}")))?
        .ok_or_else(|| {
            GatewayError::Config(format!(
                "no private key found in {}",
                tls.key_path.display()
            ))
        })?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| GatewayError::Config(format!("failed to create TLS config: {e}")))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(config)))
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>, GatewayError> {
    File::open(path).map(BufReader::new).map_err(|e| {
        GatewayError::Config(format!("failed to open {what} file {}: {e}", path.display()))
    })
}
