//! Kubernetes API integrations
//!
//! Caches, watch subscriptions and the Ingress payload builder.

pub mod cache;
pub mod ingress;
pub mod metrics;
pub mod subscription;
