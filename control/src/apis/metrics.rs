//! Controller metrics

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

lazy_static! {
    /// Controller metrics registry
    pub static ref CONTROLLER_METRICS_REGISTRY: Registry = Registry::new();

    /// Payload reconciliation duration
    static ref PAYLOAD_RECONCILIATION_DURATION: HistogramVec = {
        let opts = HistogramOpts::new(
            "payload_reconciliation_duration_seconds",
            "Payload reconciliation duration in seconds",
        );
        let histogram = HistogramVec::new(opts, &["result"])
            .expect("Failed to create histogram");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(histogram.clone()))
            .expect("Failed to register histogram");
        histogram
    };

    /// Payload reconciliations total
    static ref PAYLOAD_RECONCILIATIONS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "payload_reconciliations_total",
            "Total number of payload reconciliation passes",
        );
        let counter = IntCounterVec::new(opts, &["result"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Backends and TLS bindings left out of a payload
    static ref PAYLOAD_RESOLUTION_FAILURES_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "payload_resolution_failures_total",
            "Total number of unresolved backend or secret references",
        );
        let counter = IntCounterVec::new(opts, &["kind", "reason"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };

    /// Watch events observed per collection
    static ref WATCH_EVENTS_TOTAL: IntCounterVec = {
        let opts = Opts::new(
            "watch_events_total",
            "Total number of watch events observed",
        );
        let counter = IntCounterVec::new(opts, &["kind", "event"])
            .expect("Failed to create counter");
        CONTROLLER_METRICS_REGISTRY
            .register(Box::new(counter.clone()))
            .expect("Failed to register counter");
        counter
    };
}

/// Record a payload reconciliation pass
pub fn record_payload_reconciliation(duration_secs: f64, result: &str) {
    PAYLOAD_RECONCILIATION_DURATION
        .with_label_values(&[result])
        .observe(duration_secs);

    PAYLOAD_RECONCILIATIONS_TOTAL
        .with_label_values(&[result])
        .inc();
}

/// Record a reference omitted from a payload
pub fn record_resolution_failure(kind: &str, reason: &str) {
    PAYLOAD_RESOLUTION_FAILURES_TOTAL
        .with_label_values(&[kind, reason])
        .inc();
}

/// Record a watch event
pub fn record_watch_event(kind: &str, event: &str) {
    WATCH_EVENTS_TOTAL.with_label_values(&[kind, event]).inc();
}

/// Gather controller metrics
pub fn gather_controller_metrics() -> Result<String, String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = CONTROLLER_METRICS_REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Failed to convert to UTF-8: {}", e))
}
