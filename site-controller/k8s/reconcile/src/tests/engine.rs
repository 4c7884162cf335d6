use super::{mk_site, FakeResolver, FakeStore, Write};
use crate::{Engine, Outcome, ReconcileMetrics};
use pretty_assertions::assert_eq;
use site_controller_core::ResourceId;
use site_controller_k8s_api::{
    ConfigMap, Deployment, HorizontalPodAutoscaler, Service, Site, SiteStatus,
};
use std::time::Duration;

pub(super) fn mk_engine(
    store: FakeStore,
    resolver: FakeResolver,
) -> (Engine<FakeStore, FakeResolver>, ReconcileMetrics) {
    let metrics = ReconcileMetrics::default();
    let engine = Engine::new(store, resolver, metrics.clone(), Duration::from_secs(1));
    (engine, metrics)
}

/// Runs passes until one makes no writes.
pub(super) async fn converge(engine: &Engine<FakeStore, FakeResolver>, id: &ResourceId) {
    for _ in 0..5 {
        engine.store().take_writes();
        engine.reconcile(id).await.expect("pass must succeed");
        if engine.store().writes().is_empty() {
            return;
        }
    }
    panic!("{id} did not converge: {:?}", engine.store().writes());
}

fn write(op: &'static str, kind: &str, name: &str) -> Write {
    Write {
        op,
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

fn team_a() -> (FakeStore, ResourceId) {
    let store = FakeStore::default();
    store.put(mk_site("blog", "team-a", |s| {
        s.image = "kwite:v2".to_string();
        s.min_replicas = 2;
        s.max_replicas = 5;
    }));
    (store, ResourceId::new("blog", "team-a"))
}

#[tokio::test]
async fn first_pass_creates_every_child() {
    let (store, id) = team_a();
    let (engine, metrics) = mk_engine(store, FakeResolver::default());

    let outcome = engine.reconcile(&id).await.unwrap();
    assert_eq!(outcome, Outcome { requeue: false });
    assert_eq!(
        engine.store().writes(),
        vec![
            write("create", "Service", "team-a"),
            write("create", "ConfigMap", "team-a"),
            write("create", "Deployment", "team-a"),
            write("create", "HorizontalPodAutoscaler", "team-a"),
            write("status", "Site", "team-a"),
        ]
    );
    assert_eq!(metrics.child_writes("Workload", "create"), 1);
    assert_eq!(metrics.passes("ok"), 1);
}

#[tokio::test]
async fn converged_site_is_not_written() {
    let (store, id) = team_a();
    let (engine, metrics) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    engine.store().take_writes();
    let outcome = engine.reconcile(&id).await.unwrap();
    assert_eq!(outcome, Outcome::default());
    assert!(engine.store().writes().is_empty());
    assert_eq!(metrics.child_writes("Workload", "update"), 0);
}

#[tokio::test]
async fn allow_listed_change_updates_only_its_child() {
    let (store, id) = team_a();
    let (engine, _) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    engine
        .store()
        .edit::<Site>("blog", "team-a", |s| s.spec.image = "kwite:v3".to_string());
    engine.store().take_writes();
    engine.reconcile(&id).await.unwrap();

    assert_eq!(
        engine.store().writes(),
        vec![write("replace", "Deployment", "team-a")]
    );
    let deploy = engine.store().get_now::<Deployment>("blog", "team-a").unwrap();
    let container = &deploy.spec.unwrap().template.spec.unwrap().containers[0];
    assert_eq!(container.image.as_deref(), Some("kwite:v3"));
}

#[tokio::test]
async fn replica_count_belongs_to_the_autoscaler() {
    let (store, id) = team_a();
    let (engine, metrics) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    // The autoscaler scales the workload out.
    engine.store().edit::<Deployment>("blog", "team-a", |d| {
        if let Some(spec) = d.spec.as_mut() {
            spec.replicas = Some(4);
        }
    });
    engine.store().edit::<Site>("blog", "team-a", |s| {
        s.spec.min_replicas = 3;
        s.spec.max_replicas = 8;
    });
    engine.reconcile(&id).await.unwrap();

    let deploy = engine.store().get_now::<Deployment>("blog", "team-a").unwrap();
    assert_eq!(deploy.spec.unwrap().replicas, Some(4));
    let hpa = engine
        .store()
        .get_now::<HorizontalPodAutoscaler>("blog", "team-a")
        .unwrap()
        .spec
        .unwrap();
    assert_eq!((hpa.min_replicas, hpa.max_replicas), (Some(3), 8));
    assert_eq!(metrics.child_writes("Workload", "update"), 0);
}

#[tokio::test]
async fn missing_site_is_converged() {
    let (engine, metrics) = mk_engine(FakeStore::default(), FakeResolver::default());
    let outcome = engine
        .reconcile(&ResourceId::new("blog", "gone"))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::default());
    assert!(engine.store().writes().is_empty());
    assert_eq!(metrics.passes("ok"), 1);
}

#[tokio::test]
async fn deleting_site_is_left_alone() {
    let (store, id) = team_a();
    store.mark_deleting::<Site>("blog", "team-a");
    let (engine, _) = mk_engine(store, FakeResolver::default());

    assert_eq!(engine.reconcile(&id).await.unwrap(), Outcome::default());
    assert!(engine.store().writes().is_empty());
}

#[tokio::test]
async fn child_pending_deletion_is_skipped() {
    let (store, id) = team_a();
    let (engine, _) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    engine.store().mark_deleting::<Service>("blog", "team-a");
    engine.store().edit::<Site>("blog", "team-a", |s| s.spec.port = 9090);
    engine.store().take_writes();
    engine.reconcile(&id).await.unwrap();

    let writes = engine.store().writes();
    assert!(
        !writes.iter().any(|w| w.kind == "Service" && w.name == "team-a"),
        "deleting service must not be written: {writes:?}"
    );
}

#[tokio::test]
async fn recreates_deleted_child() {
    let (store, id) = team_a();
    let (engine, _) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    engine.store().remove::<HorizontalPodAutoscaler>("blog", "team-a");
    engine.store().take_writes();
    engine.reconcile(&id).await.unwrap();
    assert_eq!(
        engine.store().writes(),
        vec![write("create", "HorizontalPodAutoscaler", "team-a")]
    );
}

#[tokio::test]
async fn child_conflict_requests_requeue() {
    let (store, id) = team_a();
    let (engine, metrics) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    engine
        .store()
        .edit::<Site>("blog", "team-a", |s| s.spec.image = "kwite:v3".to_string());
    engine
        .store()
        .conflict_next_replace_of::<Deployment>("blog", "team-a");
    let outcome = engine.reconcile(&id).await.unwrap();
    assert!(outcome.requeue);
    assert_eq!(metrics.passes("requeue"), 1);

    // The retry converges.
    engine.store().take_writes();
    let outcome = engine.reconcile(&id).await.unwrap();
    assert!(!outcome.requeue);
    assert_eq!(
        engine.store().writes(),
        vec![write("replace", "Deployment", "team-a")]
    );
}

#[tokio::test]
async fn child_failures_are_isolated() {
    let (store, id) = team_a();
    store.fail_reads_of::<ConfigMap>();
    let (engine, _) = mk_engine(store, FakeResolver::default());

    let outcome = engine.reconcile(&id).await.unwrap();
    assert!(outcome.requeue);
    let kinds = engine
        .store()
        .writes()
        .into_iter()
        .filter(|w| w.op == "create")
        .map(|w| w.kind)
        .collect::<Vec<_>>();
    assert_eq!(kinds, vec!["Service", "Deployment", "HorizontalPodAutoscaler"]);
}

#[tokio::test]
async fn status_conflict_fails_the_pass() {
    let (store, id) = team_a();
    let (engine, metrics) = mk_engine(store, FakeResolver::default());
    converge(&engine, &id).await;

    engine.store().edit::<Deployment>("blog", "team-a", |d| {
        d.status = Some(site_controller_k8s_api::DeploymentStatus {
            ready_replicas: Some(2),
            ..Default::default()
        });
    });
    engine.store().conflict_next_replace_of::<Site>("blog", "team-a");
    let err = engine.reconcile(&id).await.unwrap_err();
    assert!(err.is_conflict(), "{err}");
    assert_eq!(metrics.passes("error"), 1);

    engine.reconcile(&id).await.unwrap();
    let status = engine.store().site("blog", "team-a").unwrap().status.unwrap();
    assert_eq!(
        status,
        SiteStatus {
            address: "team-a.blog".to_string(),
            port: 8080,
            ready_replicas: 2,
            ready: true,
            ..Default::default()
        }
    );
}
