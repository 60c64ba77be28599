//! Ingress watcher
//!
//! Watches Ingresses, Services and TLS Secrets, and delivers a debounced,
//! self-contained snapshot of every Ingress with its resolved backends and
//! certificates to a [`PayloadSink`].

pub mod apis;
pub mod config;
pub mod debounce;
pub mod error;
pub mod tls;
pub mod watcher;

#[cfg(test)]
mod test_support;

pub use apis::cache::{ObjectKey, ResourceCache, ResourceKind, StaticCache, StoreCache};
pub use apis::ingress::builder::{Caches, PayloadBuilder, Reconciler};
pub use apis::ingress::ingress::{IngressReconciler, ReconcileOutcome};
pub use apis::ingress::payload::{IngressPayload, Payload, PayloadSink, PortMap};
pub use apis::subscription::{ChangeEvent, ChangeListener};
pub use config::ControllerConfig;
pub use debounce::Debouncer;
pub use error::{CertificateError, WatcherError};
pub use tls::TlsCertificate;
pub use watcher::Watcher;
