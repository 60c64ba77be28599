//! Watch subscriptions
//!
//! One list-then-watch loop per resource collection. Each loop is the only
//! writer of its reflector store and reports every change to a shared
//! [`ChangeListener`].
//!
//! ## Event handling
//!
//! | watcher event | store                   | listener        |
//! |---------------|-------------------------|-----------------|
//! | `Apply`       | object upserted         | `Applied(key)`  |
//! | `Delete`      | object removed          | `Deleted(key)`  |
//! | `Init`        | relist buffer started   | -               |
//! | `InitApply`   | buffered, not visible   | -               |
//! | `InitDone`    | buffer swapped in       | `Relisted`      |
//!
//! Reconnection and backoff are handled by kube-runtime's watcher.

use crate::apis::cache::{ObjectKey, ResourceKind};
use crate::apis::metrics::record_watch_event;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::watcher;
use kube::runtime::WatchStreamExt;
use kube::{Api, Resource};
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A change observed on one collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// Object added or updated
    Applied(ObjectKey),
    /// Object deleted
    Deleted(ObjectKey),
    /// A full (re)list completed and replaced the cache contents
    Relisted,
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeEvent::Applied(key) => write!(f, "{} applied", key),
            ChangeEvent::Deleted(key) => write!(f, "{} deleted", key),
            ChangeEvent::Relisted => write!(f, "relisted"),
        }
    }
}

/// Receiver of change notifications from every subscription
///
/// May be called concurrently from several watch tasks.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, kind: ResourceKind, event: &ChangeEvent);
}

/// A resource collection the watcher subscribes to
pub trait WatchedResource:
    Resource<DynamicType = ()> + Clone + DeserializeOwned + fmt::Debug + Send + Sync + 'static
{
    const KIND: ResourceKind;
}

impl WatchedResource for Ingress {
    const KIND: ResourceKind = ResourceKind::Ingress;
}

impl WatchedResource for Service {
    const KIND: ResourceKind = ResourceKind::Service;
}

impl WatchedResource for Secret {
    const KIND: ResourceKind = ResourceKind::Secret;
}

/// Run a list-then-watch loop until `cancel` fires
///
/// Feeds `writer` (the cache) and notifies `listener` after every change
/// has been applied to the cache.
pub async fn run_subscription<K: WatchedResource>(
    api: Api<K>,
    watcher_config: watcher::Config,
    writer: Writer<K>,
    synced: Arc<AtomicBool>,
    listener: Arc<dyn ChangeListener>,
    cancel: CancellationToken,
) {
    let stream = reflector::reflector(writer, watcher(api, watcher_config).default_backoff());
    futures::pin_mut!(stream);

    info!("Starting {} watcher", K::KIND);

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = stream.next() => event,
        };

        match event {
            Some(event) => handle_event(event, &synced, listener.as_ref()),
            None => {
                warn!("{} watch stream ended", K::KIND);
                break;
            }
        }
    }

    info!("{} watcher stopped", K::KIND);
}

/// Translate one watcher event into a cache-state update and a notification
fn handle_event<K: WatchedResource>(
    event: Result<watcher::Event<K>, watcher::Error>,
    synced: &AtomicBool,
    listener: &dyn ChangeListener,
) {
    let kind = K::KIND;
    match event {
        Ok(watcher::Event::Apply(obj)) => {
            record_watch_event(kind.as_str(), "apply");
            let key = ObjectKey::from_resource(&obj);
            debug!("{} applied: {}", kind, key);
            listener.on_change(kind, &ChangeEvent::Applied(key));
        }
        Ok(watcher::Event::Delete(obj)) => {
            record_watch_event(kind.as_str(), "delete");
            let key = ObjectKey::from_resource(&obj);
            debug!("{} deleted: {}", kind, key);
            listener.on_change(kind, &ChangeEvent::Deleted(key));
        }
        Ok(watcher::Event::Init) => {
            debug!("{} watcher initialized", kind);
        }
        Ok(watcher::Event::InitApply(_)) => {
            // Not visible in the store until InitDone
        }
        Ok(watcher::Event::InitDone) => {
            record_watch_event(kind.as_str(), "relist");
            if !synced.swap(true, Ordering::AcqRel) {
                info!("{} watcher initial sync complete", kind);
            }
            listener.on_change(kind, &ChangeEvent::Relisted);
        }
        Err(e) => {
            record_watch_event(kind.as_str(), "error");
            warn!("{} watcher error: {}", kind, e);
        }
    }
}
