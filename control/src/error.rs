use crate::apis::cache::ResourceKind;
use thiserror::Error;

/// Ingress watcher errors
#[derive(Error, Debug)]
pub enum WatcherError {
    #[error("{0} cache has not completed its initial sync")]
    CacheNotSynced(ResourceKind),

    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] kube::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Failures turning Secret data into a usable certificate/key pair
#[derive(Error, Debug)]
pub enum CertificateError {
    #[error("Secret has no data")]
    MissingData,

    #[error("Secret missing {0}")]
    MissingField(&'static str),

    #[error("invalid PEM data: {0}")]
    InvalidPem(#[from] std::io::Error),

    #[error("No certificate found")]
    NoCertificate,

    #[error("No private key found")]
    NoPrivateKey,

    #[error("unsupported private key: {0}")]
    UnsupportedKey(rustls::Error),

    #[error("certificate does not match private key: {0}")]
    KeyMismatch(rustls::Error),
}
