//! Ingress reconciler
//!
//! Per-object entry point: given the identity of one changed Ingress, fetch
//! it and schedule a rebuild. A missing Ingress was deleted; the deletion
//! itself already reached the debouncer through the watch, so it is not
//! retried here.

use crate::apis::cache::{ObjectKey, ResourceCache};
use crate::debounce::Debouncer;
use crate::error::WatcherError;
use k8s_openapi::api::networking::v1::Ingress;
use std::sync::Arc;
use tracing::debug;

/// Result of reconciling a single Ingress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Ingress exists; a rebuild was scheduled
    Queued,
    /// Ingress no longer exists; nothing to do
    Deleted,
}

/// Ingress reconciler
pub struct IngressReconciler {
    ingresses: Arc<dyn ResourceCache<Ingress>>,
    debouncer: Debouncer,
}

impl IngressReconciler {
    pub fn new(ingresses: Arc<dyn ResourceCache<Ingress>>, debouncer: Debouncer) -> Self {
        Self {
            ingresses,
            debouncer,
        }
    }

    /// Reconcile a single Ingress by identity
    pub fn reconcile(&self, key: &ObjectKey) -> Result<ReconcileOutcome, WatcherError> {
        match self.ingresses.get(&key.namespace, &key.name) {
            Some(_) => {
                debug!("Ingress {} changed, scheduling rebuild", key);
                self.debouncer.trigger();
                Ok(ReconcileOutcome::Queued)
            }
            None => {
                debug!("Ingress {} not found, treating as deleted", key);
                Ok(ReconcileOutcome::Deleted)
            }
        }
    }
}
