//! Change notifications flowing through the debouncer into the sink

use crate::integration::fixtures::{ingress_http, service, NAMESPACE};
use crate::integration::TestContext;
use ingress_watcher::{
    ChangeEvent, ChangeListener, Debouncer, IngressReconciler, ObjectKey, ReconcileOutcome,
    ResourceKind,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const WINDOW: Duration = Duration::from_secs(1);

fn spawn_debouncer(ctx: &TestContext, cancel: &CancellationToken) -> Debouncer {
    let reconciler = ctx.reconciler();
    let (debouncer, _handle) = Debouncer::spawn(WINDOW, cancel.clone(), move || {
        reconciler.reconcile_all().expect("Pass over seeded caches succeeds");
    });
    debouncer
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_delivers_final_state_once() {
    let ctx = TestContext::new();
    let cancel = CancellationToken::new();
    let listener = spawn_debouncer(&ctx, &cancel);

    ctx.ingresses
        .insert(ingress_http("r1", "a.example.com", "svc-a", "http"));
    listener.on_change(
        ResourceKind::Ingress,
        &ChangeEvent::Applied(ObjectKey::new(NAMESPACE, "r1")),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    ctx.services.insert(service("svc-a", &[("http", 8080)]));
    listener.on_change(
        ResourceKind::Service,
        &ChangeEvent::Applied(ObjectKey::new(NAMESPACE, "svc-a")),
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    ctx.services
        .insert(service("svc-a", &[("http", 8080), ("admin", 9000)]));
    listener.on_change(
        ResourceKind::Service,
        &ChangeEvent::Applied(ObjectKey::new(NAMESPACE, "svc-a")),
    );

    tokio::time::sleep(WINDOW * 3).await;

    assert_eq!(ctx.sink.count(), 1, "Burst must collapse into one payload");
    let payload = ctx.sink.last().unwrap();
    let ports = &payload.ingress(NAMESPACE, "r1").unwrap().service_ports["svc-a"];
    assert_eq!(ports.len(), 2, "Payload reflects the state after the burst");
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn relist_schedules_a_rebuild() {
    let ctx = TestContext::new();
    let cancel = CancellationToken::new();
    let listener = spawn_debouncer(&ctx, &cancel);

    listener.on_change(ResourceKind::Secret, &ChangeEvent::Relisted);
    tokio::time::sleep(WINDOW * 2).await;

    assert_eq!(ctx.sink.count(), 1);
    assert!(ctx.sink.last().unwrap().ingresses.is_empty());
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn ingress_reconciler_queues_existing_and_skips_deleted() {
    let ctx = TestContext::new();
    let cancel = CancellationToken::new();
    let debouncer = spawn_debouncer(&ctx, &cancel);
    ctx.ingresses
        .insert(ingress_http("r1", "a.example.com", "svc-a", "http"));
    let reconciler = IngressReconciler::new(Arc::new(ctx.ingresses.clone()), debouncer);

    let outcome = reconciler
        .reconcile(&ObjectKey::new(NAMESPACE, "gone"))
        .unwrap();
    assert_eq!(outcome, ReconcileOutcome::Deleted);
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(ctx.sink.count(), 0);

    let outcome = reconciler.reconcile(&ObjectKey::new(NAMESPACE, "r1")).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Queued);
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(ctx.sink.count(), 1);
    assert!(ctx.sink.last().unwrap().ingress(NAMESPACE, "r1").is_some());
    cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_further_rebuilds() {
    let ctx = TestContext::new();
    let cancel = CancellationToken::new();
    let reconciler = ctx.reconciler();
    let (debouncer, handle) = Debouncer::spawn(WINDOW, cancel.clone(), move || {
        reconciler.reconcile_all().expect("Pass over seeded caches succeeds");
    });

    debouncer.trigger();
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(ctx.sink.count(), 1);

    cancel.cancel();
    handle.await.unwrap();

    debouncer.trigger();
    tokio::time::sleep(WINDOW * 2).await;
    assert_eq!(ctx.sink.count(), 1, "No rebuild after shutdown");
}
