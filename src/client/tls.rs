//! TLS client configuration
//!
//! Built once per run from `-k`, `-E` and `--cacert`. Only an unreadable
//! client certificate is fatal here; a bad CA bundle degrades to a warning.

use crate::{
    error::{AppError, Result},
    logging::Logger,
};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName, UnixTime};
use std::path::Path;
use std::sync::Arc;

/// ALPN identifiers offered on every handshake, multiplexed first
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Options feeding [`build_client_config`]
#[derive(Debug, Clone, Default)]
pub struct TlsOptions<'a> {
    pub insecure: bool,
    pub client_cert: Option<&'a Path>,
    pub ca_cert: Option<&'a Path>,
}

/// Assemble the rustls client configuration for the run
pub fn build_client_config(options: &TlsOptions<'_>, logger: &Logger) -> Result<ClientConfig> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?;

    let builder = if options.insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier(provider)))
    } else {
        builder.with_root_certificates(root_store(options.ca_cert, logger))
    };

    let mut config = match options.client_cert {
        Some(path) => {
            let (certs, key) = read_client_cert(path)?;
            builder
                .with_client_auth_cert(certs, key)
                .map_err(|e| AppError::credential(format!("Failed to read client certificate file: {}", e)))?
        }
        None => builder.with_no_client_auth(),
    };

    config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();
    Ok(config)
}

/// Bundled web roots plus whatever the CA bundle adds
fn root_store(ca_cert: Option<&Path>, logger: &Logger) -> RootCertStore {
    let mut roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    if let Some(path) = ca_cert {
        match read_ca_certs(path) {
            Ok(certs) => {
                let (added, ignored) = roots.add_parsable_certificates(certs);
                if added == 0 {
                    crate::log_warn!(
                        logger,
                        "No usable certificates in CA bundle {} ({} ignored)",
                        path.display(),
                        ignored
                    );
                }
            }
            Err(e) => crate::log_warn!(logger, "{}", e),
        }
    }

    roots
}

/// Every certificate in a PEM bundle
pub fn read_ca_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::io(format!("failed to read CA certificate file: {}", e)))?;
    CertificateDer::pem_slice_iter(&bytes)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AppError::parse(format!("failed to parse CA certificate file: {}", e)))
}

/// Certificate chain and private key from a single PEM file
pub fn read_client_cert(path: &Path) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let bytes = std::fs::read(path)
        .map_err(|e| AppError::credential(format!("Failed to read client certificate file: {}", e)))?;
    parse_client_cert(&bytes)
}

pub fn parse_client_cert(pem: &[u8]) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| AppError::credential(format!("Failed to parse client certificate: {}", e)))?;
    if certs.is_empty() {
        return Err(AppError::credential("no CERTIFICATE block in client certificate file"));
    }

    let key = PrivateKeyDer::from_pem_slice(pem)
        .map_err(|e| AppError::credential(format!("Failed to parse client private key: {}", e)))?;

    Ok((certs, key))
}

/// Server name for SNI and verification: the host without any port
pub fn server_name(host: &str) -> Result<ServerName<'static>> {
    let host = strip_port(host);
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    ServerName::try_from(host.to_string())
        .map_err(|_| AppError::tls(format!("invalid server name: {}", host)))
}

/// `example.com:8443` becomes `example.com`; bare IPv6 literals are left alone
fn strip_port(authority: &str) -> &str {
    if authority.starts_with('[') {
        return match authority.find(']') {
            Some(end) => &authority[..=end],
            None => authority,
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') && port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    }
}

/// Accepts any server certificate (`-k`); signatures are still checked
#[derive(Debug)]
struct NoVerifier(Arc<CryptoProvider>);

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(message, cert, dss, &self.0.signature_verification_algorithms)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_offers_h2_and_http11() {
        let config = build_client_config(&TlsOptions::default(), &Logger::new("TEST")).unwrap();
        assert_eq!(config.alpn_protocols, vec![b"h2".to_vec(), b"http/1.1".to_vec()]);
    }

    #[test]
    fn test_insecure_config_builds() {
        let options = TlsOptions { insecure: true, ..Default::default() };
        assert!(build_client_config(&options, &Logger::new("TEST")).is_ok());
    }

    #[test]
    fn test_missing_client_cert_is_credential_error() {
        let options = TlsOptions {
            client_cert: Some(Path::new("/nonexistent/client.pem")),
            ..Default::default()
        };
        let error = build_client_config(&options, &Logger::new("TEST")).unwrap_err();
        assert!(matches!(error, AppError::Credential(_)));
    }

    #[test]
    fn test_client_cert_without_blocks_is_rejected() {
        assert!(matches!(
            parse_client_cert(b"not a pem file"),
            Err(AppError::Credential(_))
        ));
    }

    #[test]
    fn test_bad_ca_bundle_only_warns() {
        let mut bundle = NamedTempFile::new().unwrap();
        writeln!(bundle, "garbage").unwrap();

        let options = TlsOptions { ca_cert: Some(bundle.path()), ..Default::default() };
        assert!(build_client_config(&options, &Logger::new("TEST")).is_ok());

        let options = TlsOptions {
            ca_cert: Some(Path::new("/nonexistent/ca.pem")),
            ..Default::default()
        };
        assert!(build_client_config(&options, &Logger::new("TEST")).is_ok());
    }

    #[test]
    fn test_server_name_drops_port() {
        let expect = |name: &'static str| ServerName::try_from(name).unwrap();
        assert_eq!(server_name("example.com:8443").unwrap(), expect("example.com"));
        assert_eq!(server_name("example.com").unwrap(), expect("example.com"));
        assert_eq!(server_name("[::1]:443").unwrap(), expect("::1"));
        assert_eq!(server_name("127.0.0.1").unwrap(), expect("127.0.0.1"));
    }
}
