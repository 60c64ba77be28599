//! Shared fixtures for unit tests

use k8s_openapi::api::core::v1::{Secret, Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use std::collections::BTreeMap;

fn meta(namespace: &str, name: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

/// Generate a self-signed certificate at runtime (no keys in the repo)
pub fn generate_test_cert(hostname: &str) -> (Vec<u8>, Vec<u8>) {
    use rcgen::{CertificateParams, DistinguishedName, DnType, KeyPair};

    let key_pair = KeyPair::generate().expect("Failed to generate key pair");

    let mut params = CertificateParams::new(vec![hostname.to_string()])
        .expect("Failed to create certificate params");
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, hostname);
    params.distinguished_name = dn;

    let cert = params
        .self_signed(&key_pair)
        .expect("Failed to generate self-signed certificate");

    (cert.pem().into_bytes(), key_pair.serialize_pem().into_bytes())
}

/// Service exposing the given (port name, port number) pairs
pub fn service(namespace: &str, name: &str, ports: &[(&str, i32)]) -> Service {
    Service {
        metadata: meta(namespace, name),
        spec: Some(ServiceSpec {
            ports: Some(
                ports
                    .iter()
                    .map(|(port_name, port)| ServicePort {
                        name: if port_name.is_empty() {
                            None
                        } else {
                            Some(port_name.to_string())
                        },
                        port: *port,
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// `kubernetes.io/tls` Secret holding the given PEM pair
pub fn tls_secret(namespace: &str, name: &str, cert_pem: &[u8], key_pem: &[u8]) -> Secret {
    let mut data = BTreeMap::new();
    data.insert("tls.crt".to_string(), ByteString(cert_pem.to_vec()));
    data.insert("tls.key".to_string(), ByteString(key_pem.to_vec()));

    Secret {
        metadata: meta(namespace, name),
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// Backend pointing at a named service port
pub fn backend(service: &str, port_name: &str) -> IngressBackend {
    IngressBackend {
        service: Some(IngressServiceBackend {
            name: service.to_string(),
            port: Some(ServiceBackendPort {
                name: Some(port_name.to_string()),
                number: None,
            }),
        }),
        resource: None,
    }
}

/// Builder for Ingress fixtures
pub struct IngressBuilder {
    ingress: Ingress,
}

impl IngressBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            ingress: Ingress {
                metadata: meta(namespace, name),
                spec: Some(IngressSpec::default()),
                ..Default::default()
            },
        }
    }

    fn spec(&mut self) -> &mut IngressSpec {
        self.ingress.spec.get_or_insert_with(IngressSpec::default)
    }

    pub fn default_backend(mut self, backend: IngressBackend) -> Self {
        self.spec().default_backend = Some(backend);
        self
    }

    /// Add a host rule with one path per backend
    pub fn rule(mut self, host: &str, backends: Vec<IngressBackend>) -> Self {
        let paths = backends
            .into_iter()
            .enumerate()
            .map(|(i, backend)| HTTPIngressPath {
                path: Some(format!("/p{}", i)),
                path_type: "Prefix".to_string(),
                backend,
            })
            .collect();

        self.spec()
            .rules
            .get_or_insert_with(Vec::new)
            .push(IngressRule {
                host: Some(host.to_string()),
                http: Some(HTTPIngressRuleValue { paths }),
            });
        self
    }

    /// Add a host rule without an `http` block
    pub fn bare_rule(mut self, host: &str) -> Self {
        self.spec()
            .rules
            .get_or_insert_with(Vec::new)
            .push(IngressRule {
                host: Some(host.to_string()),
                http: None,
            });
        self
    }

    pub fn tls(mut self, secret_name: &str, hosts: &[&str]) -> Self {
        self.spec().tls.get_or_insert_with(Vec::new).push(IngressTLS {
            hosts: Some(hosts.iter().map(|h| h.to_string()).collect()),
            secret_name: Some(secret_name.to_string()),
        });
        self
    }

    pub fn build(self) -> Ingress {
        self.ingress
    }
}
