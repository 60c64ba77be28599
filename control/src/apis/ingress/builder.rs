//! Payload builder
//!
//! Cross-references every Ingress against the Service and Secret caches and
//! produces one [`Payload`]. Unresolvable references are logged and left
//! out; only a cache that cannot be listed or has not synced aborts a pass.

use super::payload::{
    backend_refs, tls_secret_names, BackendRef, IngressPayload, Payload, PayloadSink, PortMap,
};
use crate::apis::cache::{ObjectKey, ResourceCache, ResourceKind};
use crate::apis::metrics::{record_payload_reconciliation, record_resolution_failure};
use crate::error::WatcherError;
use crate::tls::{parse_cert_from_secret_data, TlsCertificate};
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::ResourceExt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The three caches a pass reads from
#[derive(Clone)]
pub struct Caches {
    pub ingresses: Arc<dyn ResourceCache<Ingress>>,
    pub services: Arc<dyn ResourceCache<Service>>,
    pub secrets: Arc<dyn ResourceCache<Secret>>,
}

impl Caches {
    pub fn new(
        ingresses: Arc<dyn ResourceCache<Ingress>>,
        services: Arc<dyn ResourceCache<Service>>,
        secrets: Arc<dyn ResourceCache<Secret>>,
    ) -> Self {
        Self {
            ingresses,
            services,
            secrets,
        }
    }
}

/// Builds payloads from the current cache contents
#[derive(Clone)]
pub struct PayloadBuilder {
    caches: Caches,
}

impl PayloadBuilder {
    pub fn new(caches: Caches) -> Self {
        Self { caches }
    }

    pub fn caches(&self) -> &Caches {
        &self.caches
    }

    /// Build a full payload
    ///
    /// Fails while any cache is still waiting for its initial listing, so a
    /// half-synced view never produces a payload with references stripped.
    pub fn build(&self) -> Result<Payload, WatcherError> {
        let ingresses = self.caches.ingresses.list()?;
        if !self.caches.services.is_synced() {
            return Err(WatcherError::CacheNotSynced(ResourceKind::Service));
        }
        if !self.caches.secrets.is_synced() {
            return Err(WatcherError::CacheNotSynced(ResourceKind::Secret));
        }

        let mut payload = Payload::default();
        // (namespace, secret name) pairs already looked up this pass
        let mut seen_secrets: HashSet<ObjectKey> = HashSet::new();

        for ingress in ingresses {
            let namespace = ingress.namespace().unwrap_or_default();
            let mut ingress_payload = IngressPayload::new(Arc::clone(&ingress));
            // Services this Ingress references that could not be found
            let mut unresolved: HashSet<String> = HashSet::new();

            for backend_ref in backend_refs(&ingress) {
                self.add_backend(&mut ingress_payload, &mut unresolved, &backend_ref);
            }

            for secret_name in tls_secret_names(&ingress) {
                let key = ObjectKey::new(namespace.as_str(), secret_name.as_str());
                if !seen_secrets.insert(key.clone()) {
                    continue;
                }

                if payload.tls_certificates.contains_key(&secret_name) {
                    debug!(
                        "Secret name {} already provided by another namespace, skipping {}",
                        secret_name, key
                    );
                    continue;
                }

                if let Some(cert) = self.resolve_certificate(&key) {
                    payload.tls_certificates.insert(secret_name, Arc::new(cert));
                }
            }

            payload.ingresses.push(ingress_payload);
        }

        Ok(payload)
    }

    /// Record the ports of a referenced Service, if it exists
    fn add_backend(
        &self,
        ingress_payload: &mut IngressPayload,
        unresolved: &mut HashSet<String>,
        backend_ref: &BackendRef,
    ) {
        if ingress_payload
            .service_ports
            .contains_key(&backend_ref.service)
            || unresolved.contains(&backend_ref.service)
        {
            return;
        }

        let Some(service) = self
            .caches
            .services
            .get(&backend_ref.namespace, &backend_ref.service)
        else {
            warn!(
                namespace = %backend_ref.namespace,
                name = %backend_ref.service,
                "unknown service"
            );
            record_resolution_failure("service", "not_found");
            unresolved.insert(backend_ref.service.clone());
            return;
        };

        let ports: PortMap = service
            .spec
            .as_ref()
            .and_then(|spec| spec.ports.as_ref())
            .into_iter()
            .flatten()
            .map(|port| (port.name.clone().unwrap_or_default(), port.port))
            .collect();

        if !backend_ref.port_exposed(&ports) {
            debug!(
                "Backend {} references a port the Service does not expose",
                backend_ref
            );
        }

        ingress_payload
            .service_ports
            .insert(service.name_any(), ports);
    }

    /// Look up and parse a TLS Secret
    fn resolve_certificate(&self, key: &ObjectKey) -> Option<TlsCertificate> {
        let Some(secret) = self.caches.secrets.get(&key.namespace, &key.name) else {
            warn!(namespace = %key.namespace, name = %key.name, "unknown secret");
            record_resolution_failure("secret", "not_found");
            return None;
        };

        match parse_cert_from_secret_data(&secret) {
            Ok(cert) => Some(cert),
            Err(e) => {
                warn!(
                    namespace = %key.namespace,
                    name = %key.name,
                    error = %e,
                    "invalid tls certificate"
                );
                record_resolution_failure("secret", "invalid_certificate");
                None
            }
        }
    }
}

/// Runs one full pass and hands the result to the sink
pub struct Reconciler {
    builder: PayloadBuilder,
    sink: Arc<dyn PayloadSink>,
}

impl Reconciler {
    pub fn new(builder: PayloadBuilder, sink: Arc<dyn PayloadSink>) -> Self {
        Self { builder, sink }
    }

    /// Rebuild the payload and deliver it
    ///
    /// The sink is called exactly once on success and never on failure.
    pub fn reconcile_all(&self) -> Result<(), WatcherError> {
        let start = Instant::now();

        let payload = match self.builder.build() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Failed to build payload, skipping pass: {}", e);
                record_payload_reconciliation(start.elapsed().as_secs_f64(), "error");
                return Err(e);
            }
        };

        info!(
            ingresses = payload.ingresses.len(),
            certificates = payload.tls_certificates.len(),
            "Payload built"
        );

        self.sink.apply(payload);
        record_payload_reconciliation(start.elapsed().as_secs_f64(), "success");
        Ok(())
    }
}
