//! Watcher
//!
//! Wires the three subscriptions, the debouncer and the payload builder:
//!
//! ```text
//! Ingress watch ─┐
//! Service watch ─┼─▶ Debouncer ─▶ Reconciler ─▶ PayloadSink
//! Secret watch  ─┘       ▲
//! resync timer ──────────┘
//! ```
//!
//! Every task stops on the same cancellation token; `run()` returns once all
//! of them have exited and any in-flight pass has been delivered.

use crate::apis::cache::StoreCache;
use crate::apis::ingress::builder::{Caches, PayloadBuilder, Reconciler};
use crate::apis::ingress::payload::PayloadSink;
use crate::apis::subscription::{run_subscription, ChangeListener, WatchedResource};
use crate::config::ControllerConfig;
use crate::debounce::Debouncer;
use crate::error::WatcherError;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::api::networking::v1::Ingress;
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::reflector::{self, store::Writer};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::{Api, Client, Resource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Watches Ingresses, Services and Secrets and emits payloads
pub struct Watcher {
    client: Client,
    config: ControllerConfig,
    sink: Arc<dyn PayloadSink>,
}

impl Watcher {
    pub fn new(client: Client, config: ControllerConfig, sink: Arc<dyn PayloadSink>) -> Self {
        Self {
            client,
            config,
            sink,
        }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>,
    {
        match &self.config.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }

    fn spawn_subscription<K>(
        &self,
        writer: Writer<K>,
        cache: &StoreCache<K>,
        watcher_config: &WatcherConfig,
        listener: &Arc<dyn ChangeListener>,
        cancel: &CancellationToken,
    ) -> JoinHandle<()>
    where
        K: WatchedResource + Resource<Scope = NamespaceResourceScope>,
    {
        tokio::spawn(run_subscription(
            self.api::<K>(),
            watcher_config.clone(),
            writer,
            cache.synced_flag(),
            Arc::clone(listener),
            cancel.clone(),
        ))
    }

    /// Run until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) -> Result<(), WatcherError> {
        self.config.validate()?;

        info!(
            namespace = self.config.namespace.as_deref().unwrap_or("<all>"),
            debounce_ms = self.config.debounce_ms,
            resync_secs = self.config.resync_secs,
            "Starting ingress watcher"
        );

        let (ingress_store, ingress_writer) = reflector::store::<Ingress>();
        let (service_store, service_writer) = reflector::store::<Service>();
        let (secret_store, secret_writer) = reflector::store::<Secret>();

        let ingresses = Arc::new(StoreCache::new(
            <Ingress as WatchedResource>::KIND,
            ingress_store,
        ));
        let services = Arc::new(StoreCache::new(
            <Service as WatchedResource>::KIND,
            service_store,
        ));
        let secrets = Arc::new(StoreCache::new(
            <Secret as WatchedResource>::KIND,
            secret_store,
        ));

        let caches = Caches::new(ingresses.clone(), services.clone(), secrets.clone());
        let reconciler = Reconciler::new(PayloadBuilder::new(caches), Arc::clone(&self.sink));

        let (debouncer, debounce_task) =
            Debouncer::spawn(self.config.debounce_window(), cancel.clone(), move || {
                // Already logged and counted; the next trigger retries
                if let Err(e) = reconciler.reconcile_all() {
                    debug!("Rebuild deferred: {}", e);
                }
            });
        let listener: Arc<dyn ChangeListener> = Arc::new(debouncer.clone());

        let watcher_config = WatcherConfig::default().timeout(self.config.watch_timeout_secs);
        let ingress_task = self.spawn_subscription(
            ingress_writer,
            &ingresses,
            &watcher_config,
            &listener,
            &cancel,
        );
        let service_task = self.spawn_subscription(
            service_writer,
            &services,
            &watcher_config,
            &listener,
            &cancel,
        );
        let secret_task = self.spawn_subscription(
            secret_writer,
            &secrets,
            &watcher_config,
            &listener,
            &cancel,
        );
        let resync_task = tokio::spawn(run_resync(
            self.config.resync_period(),
            debouncer,
            cancel.clone(),
        ));

        let (ingress, service, secret, resync) =
            tokio::join!(ingress_task, service_task, secret_task, resync_task);
        ingress?;
        service?;
        secret?;
        resync?;

        // Waits for a pass that was already running at cancellation
        debounce_task.await?;
        info!("Ingress watcher stopped");
        Ok(())
    }
}

/// Periodically force a full rebuild to heal missed events
async fn run_resync(period: Duration, debouncer: Debouncer, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    // First tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                debug!("Periodic resync, scheduling rebuild");
                debouncer.trigger();
            }
        }
    }
}
