use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::sync::Arc;

use pgwire::tokio::TlsAcceptor;
use pgwire::tokio::tokio_rustls::rustls::ServerConfig;
use pgwire::tokio::tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::info;

use crate::config::Config;

/// Build the server's TLS acceptor from `CHAIRTIME_TLS_CERT` and
/// `CHAIRTIME_TLS_KEY`. Plaintext (`None`) when neither is set.
pub fn acceptor(cfg: &Config) -> io::Result<Option<TlsAcceptor>> {
    let (cert_path, key_path) = match (cfg.tls_cert.as_deref(), cfg.tls_key.as_deref()) {
        (None, None) => return Ok(None),
        (Some(cert), Some(key)) => (cert, key),
        (Some(_), None) => return Err(half_configured("CHAIRTIME_TLS_KEY")),
        (None, Some(_)) => return Err(half_configured("CHAIRTIME_TLS_CERT")),
    };

    let certs = read_certs(cert_path)?;
    let chain_len = certs.len();
    let key = read_key(key_path)?;

    let mut config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| io::Error::new(ErrorKind::InvalidInput, format!("{cert_path}: {e}")))?;
    // libpq 17 negotiates direct TLS with this ALPN id
    config.alpn_protocols = vec![b"postgresql".to_vec()];

    info!("tls: {chain_len} certificate(s) from {cert_path}, key from {key_path}");
    Ok(Some(TlsAcceptor::from(Arc::new(config))))
}

fn half_configured(missing: &str) -> io::Error {
    io::Error::new(
        ErrorKind::InvalidInput,
        format!("TLS needs both a certificate and a key; {missing} is not set"),
    )
}

fn open(path: &str) -> io::Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| io::Error::new(e.kind(), format!("{path}: {e}")))
}

fn read_certs(path: &str) -> io::Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| io::Error::new(e.kind(), format!("{path}: {e}")))?;
    if certs.is_empty() {
        return Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("{path}: no certificates found"),
        ));
    }
    Ok(certs)
}

fn read_key(path: &str) -> io::Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| io::Error::new(e.kind(), format!("{path}: {e}")))?
        .ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidData,
                format!("{path}: no private key found"),
            )
        })
}
