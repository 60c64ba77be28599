//! Kubernetes objects for integration scenarios
//!
//! Ingresses and Services are built from manifests the way they would come
//! off the API server; TLS material is generated at runtime.

use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use serde_json::{json, Value};
use std::collections::BTreeMap;

pub const NAMESPACE: &str = "default";

/// Ingress with one host rule routing `/` to `service:port_name`
pub fn ingress_http(name: &str, host: &str, service: &str, port_name: &str) -> Ingress {
    ingress_from_spec(
        name,
        json!({
            "rules": [{
                "host": host,
                "http": {
                    "paths": [{
                        "path": "/",
                        "pathType": "Prefix",
                        "backend": {
                            "service": { "name": service, "port": { "name": port_name } }
                        }
                    }]
                }
            }]
        }),
    )
}

/// Ingress with a single TLS block and no rules
pub fn ingress_tls(name: &str, host: &str, secret_name: &str) -> Ingress {
    ingress_from_spec(
        name,
        json!({
            "tls": [{ "hosts": [host], "secretName": secret_name }]
        }),
    )
}

pub fn ingress_from_spec(name: &str, spec: Value) -> Ingress {
    serde_json::from_value(json!({
        "apiVersion": "networking.k8s.io/v1",
        "kind": "Ingress",
        "metadata": { "namespace": NAMESPACE, "name": name },
        "spec": spec,
    }))
    .expect("Invalid Ingress manifest")
}

/// ClusterIP Service with named TCP ports
pub fn service(name: &str, ports: &[(&str, i32)]) -> Service {
    let ports: Vec<Value> = ports
        .iter()
        .map(|(port_name, port)| json!({ "name": port_name, "port": port, "protocol": "TCP" }))
        .collect();

    serde_json::from_value(json!({
        "apiVersion": "v1",
        "kind": "Service",
        "metadata": { "namespace": NAMESPACE, "name": name },
        "spec": { "type": "ClusterIP", "ports": ports },
    }))
    .expect("Invalid Service manifest")
}

/// kubernetes.io/tls Secret holding a freshly generated certificate
pub fn tls_secret(name: &str, hostname: &str) -> Secret {
    let (cert_pem, key_pem) = generate_cert(hostname);

    let mut data = BTreeMap::new();
    data.insert("tls.crt".to_string(), ByteString(cert_pem));
    data.insert("tls.key".to_string(), ByteString(key_pem));

    Secret {
        metadata: ObjectMeta {
            namespace: Some(NAMESPACE.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/tls".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

fn generate_cert(hostname: &str) -> (Vec<u8>, Vec<u8>) {
    let key_pair = rcgen::KeyPair::generate().expect("Failed to generate key pair");
    let params = rcgen::CertificateParams::new(vec![hostname.to_string()])
        .expect("Failed to create certificate params");
    let cert = params
        .self_signed(&key_pair)
        .expect("Failed to self-sign certificate");

    (cert.pem().into_bytes(), key_pair.serialize_pem().into_bytes())
}
