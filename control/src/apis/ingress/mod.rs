//! Ingress support (networking.k8s.io/v1)
//!
//! - payload: snapshot types handed to the downstream consumer
//! - builder: cross-references Ingresses, Services and Secrets into a payload
//! - ingress: per-object reconciliation entry point

pub mod builder;
#[allow(clippy::module_inception)]
pub mod ingress;
pub mod payload;
