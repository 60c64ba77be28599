use anyhow::Result;
use ingress_watcher::apis::metrics::gather_controller_metrics;
use ingress_watcher::{ControllerConfig, Payload, PayloadSink, Watcher};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Logs a summary of every payload it receives
struct LoggingSink;

impl PayloadSink for LoggingSink {
    fn apply(&self, payload: Payload) {
        let backends: usize = payload
            .ingresses
            .iter()
            .map(|ingress| ingress.service_ports.len())
            .sum();
        info!(
            ingresses = payload.ingresses.len(),
            services = backends,
            certificates = payload.tls_certificates.len(),
            "Payload updated"
        );
        for ingress in &payload.ingresses {
            debug!(
                "  {}/{}: services={:?}",
                ingress.ingress.metadata.namespace.as_deref().unwrap_or(""),
                ingress.ingress.metadata.name.as_deref().unwrap_or(""),
                ingress.service_ports.keys().collect::<Vec<_>>()
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize rustls crypto provider (needed for Kubernetes TLS client)
    rustls::crypto::ring::default_provider()
        .install_default()
        .ok(); // Ignore error if already installed

    tracing_subscriber::fmt::init();

    let config = ControllerConfig::from_env()?;
    info!("Ingress watcher starting");

    let client = kube::Client::try_default().await?;
    let watcher = Watcher::new(client, config, Arc::new(LoggingSink));

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
        }
        shutdown.cancel();
    });

    watcher.run(cancel).await?;

    match gather_controller_metrics() {
        Ok(metrics) => debug!("Final metrics:\n{}", metrics),
        Err(e) => warn!("Failed to gather metrics: {}", e),
    }

    Ok(())
}
