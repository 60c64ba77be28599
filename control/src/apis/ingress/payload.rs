//! Payload types handed to the downstream consumer

use crate::tls::TlsCertificate;
use k8s_openapi::api::networking::v1::{Ingress, IngressBackend};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Port name → port number for one Service
pub type PortMap = BTreeMap<String, i32>;

/// A complete, consistent snapshot of routing configuration
///
/// Built fresh on every pass and moved into the sink; the producer keeps no
/// handle to it afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    /// One entry per Ingress, ordered by (namespace, name)
    pub ingresses: Vec<IngressPayload>,
    /// Parsed certificate pairs keyed by Secret name
    pub tls_certificates: BTreeMap<String, Arc<TlsCertificate>>,
}

impl Payload {
    /// Find the entry for a given Ingress
    pub fn ingress(&self, namespace: &str, name: &str) -> Option<&IngressPayload> {
        self.ingresses.iter().find(|p| {
            p.ingress.namespace().as_deref() == Some(namespace) && p.ingress.name_any() == name
        })
    }
}

/// An Ingress plus the ports of every Service it references
#[derive(Debug, Clone, PartialEq)]
pub struct IngressPayload {
    pub ingress: Arc<Ingress>,
    /// Service name → (port name → port number)
    pub service_ports: BTreeMap<String, PortMap>,
}

impl IngressPayload {
    pub fn new(ingress: Arc<Ingress>) -> Self {
        Self {
            ingress,
            service_ports: BTreeMap::new(),
        }
    }
}

/// Port of a backend reference, by name or number
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BackendPort {
    Name(String),
    Number(i32),
}

impl fmt::Display for BackendPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendPort::Name(name) => write!(f, "{}", name),
            BackendPort::Number(number) => write!(f, "{}", number),
        }
    }
}

/// A Service backend referenced by an Ingress
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendRef {
    pub namespace: String,
    pub service: String,
    pub port: Option<BackendPort>,
}

impl BackendRef {
    /// Extract a Service reference; `None` for resource backends
    pub fn from_ingress_backend(namespace: &str, backend: &IngressBackend) -> Option<Self> {
        let service = backend.service.as_ref()?;
        let port = service.port.as_ref().and_then(|p| {
            match (p.name.as_deref().filter(|n| !n.is_empty()), p.number) {
                (Some(name), _) => Some(BackendPort::Name(name.to_string())),
                (None, Some(number)) => Some(BackendPort::Number(number)),
                (None, None) => None,
            }
        });

        Some(Self {
            namespace: namespace.to_string(),
            service: service.name.clone(),
            port,
        })
    }

    /// Whether the Service port map exposes the referenced port
    pub fn port_exposed(&self, ports: &PortMap) -> bool {
        match &self.port {
            None => true,
            Some(BackendPort::Name(name)) => ports.contains_key(name),
            Some(BackendPort::Number(number)) => ports.values().any(|p| p == number),
        }
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.port {
            Some(port) => write!(f, "{}/{}:{}", self.namespace, self.service, port),
            None => write!(f, "{}/{}", self.namespace, self.service),
        }
    }
}

/// Every Service backend referenced by an Ingress, in manifest order
///
/// Default backend first, then every path of every rule that has an
/// `http` block.
pub fn backend_refs(ingress: &Ingress) -> Vec<BackendRef> {
    let namespace = ingress.namespace().unwrap_or_default();
    let Some(spec) = ingress.spec.as_ref() else {
        return Vec::new();
    };

    let rule_backends = spec
        .rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter().map(|path| &path.backend));

    spec.default_backend
        .iter()
        .chain(rule_backends)
        .filter_map(|backend| BackendRef::from_ingress_backend(&namespace, backend))
        .collect()
}

/// Every non-empty TLS Secret name referenced by an Ingress
pub fn tls_secret_names(ingress: &Ingress) -> Vec<String> {
    ingress
        .spec
        .as_ref()
        .and_then(|spec| spec.tls.as_ref())
        .into_iter()
        .flatten()
        .filter_map(|tls| tls.secret_name.clone())
        .filter(|name| !name.is_empty())
        .collect()
}

/// Receiver of completed payloads
///
/// Must not block indefinitely: the next rebuild waits for it to return.
pub trait PayloadSink: Send + Sync {
    fn apply(&self, payload: Payload);
}

impl<F> PayloadSink for F
where
    F: Fn(Payload) + Send + Sync,
{
    fn apply(&self, payload: Payload) {
        self(payload)
    }
}
