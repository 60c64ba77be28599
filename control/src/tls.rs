//! Certificate material loaded from Kubernetes Secrets
//!
//! Secrets carry a PEM certificate chain under `tls.crt` and a PEM private
//! key under `tls.key`. A pair is only accepted when both parse and the
//! leaf certificate's public key matches the private key.

use crate::error::CertificateError;
use k8s_openapi::api::core::v1::Secret;
use rustls::pki_types::CertificateDer;
use rustls::sign::CertifiedKey;
use rustls_pemfile::{certs, private_key};
use std::fmt;
use std::io::BufReader;
use std::sync::Arc;

/// Secret data key holding the certificate chain
pub const TLS_CERT_KEY: &str = "tls.crt";
/// Secret data key holding the private key
pub const TLS_PRIVATE_KEY_KEY: &str = "tls.key";

/// A parsed certificate chain + private key
#[derive(Clone)]
pub struct TlsCertificate {
    /// Certificate chain (PEM format)
    pub cert_chain: Vec<u8>,
    /// Private key (PEM format)
    pub private_key: Vec<u8>,
    certified_key: Arc<CertifiedKey>,
}

impl TlsCertificate {
    /// Parse and validate a certificate/key pair from PEM bytes
    pub fn from_pem(cert_pem: &[u8], key_pem: &[u8]) -> Result<Self, CertificateError> {
        let mut cert_reader = BufReader::new(cert_pem);
        let chain: Vec<CertificateDer<'static>> =
            certs(&mut cert_reader).collect::<Result<Vec<_>, _>>()?;
        if chain.is_empty() {
            return Err(CertificateError::NoCertificate);
        }

        let mut key_reader = BufReader::new(key_pem);
        let key = private_key(&mut key_reader)?.ok_or(CertificateError::NoPrivateKey)?;

        let signing_key = rustls::crypto::ring::sign::any_supported_type(&key)
            .map_err(CertificateError::UnsupportedKey)?;

        let certified_key = CertifiedKey::new(chain, signing_key);
        certified_key
            .keys_match()
            .map_err(CertificateError::KeyMismatch)?;

        Ok(Self {
            cert_chain: cert_pem.to_vec(),
            private_key: key_pem.to_vec(),
            certified_key: Arc::new(certified_key),
        })
    }

    /// Parsed chain and signing key, ready for a rustls cert resolver
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.certified_key)
    }

    /// Number of certificates in the chain (leaf first)
    pub fn chain_len(&self) -> usize {
        self.certified_key.cert.len()
    }
}

impl PartialEq for TlsCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.cert_chain == other.cert_chain && self.private_key == other.private_key
    }
}

impl Eq for TlsCertificate {}

// Key bytes stay out of logs
impl fmt::Debug for TlsCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsCertificate")
            .field("chain_len", &self.chain_len())
            .field("cert_chain_bytes", &self.cert_chain.len())
            .finish_non_exhaustive()
    }
}

/// Parse certificate from Secret data
///
/// Expects Secret.data with keys:
/// - `tls.crt`: Certificate chain (PEM format)
/// - `tls.key`: Private key (PEM format)
pub fn parse_cert_from_secret_data(secret: &Secret) -> Result<TlsCertificate, CertificateError> {
    let data = secret.data.as_ref().ok_or(CertificateError::MissingData)?;

    let cert_data = data
        .get(TLS_CERT_KEY)
        .ok_or(CertificateError::MissingField(TLS_CERT_KEY))?;

    let key_data = data
        .get(TLS_PRIVATE_KEY_KEY)
        .ok_or(CertificateError::MissingField(TLS_PRIVATE_KEY_KEY))?;

    TlsCertificate::from_pem(&cert_data.0, &key_data.0)
}
