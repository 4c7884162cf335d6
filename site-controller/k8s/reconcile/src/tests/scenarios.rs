use super::{
    engine::{converge, mk_engine},
    mk_site, FakeResolver, FakeStore,
};
use crate::rewrite;
use pretty_assertions::assert_eq;
use site_controller_core::{ResourceId, RewriteTable, REWRITE_KEY};
use site_controller_k8s_api::{
    ConfigMap, Deployment, HorizontalPodAutoscaler, Service, Site, SiteStatus,
};

fn resolver() -> FakeResolver {
    FakeResolver::default()
        .with_service("a.blog", "10.96.0.10", &["a.blog.svc.cluster.local."])
        .with_service("b.blog", "10.96.0.11", &["b.blog.svc.cluster.local."])
        .with_service(
            "team-a.blog",
            "10.96.0.12",
            &["10-96-0-12.blog.svc.", "team-a.blog.svc.cluster.local."],
        )
}

fn rewrite_table(store: &FakeStore, name: &str) -> RewriteTable {
    let cm = store
        .configuration("blog", name)
        .expect("configuration must exist");
    rewrite::decode(&cm).expect("rewrite table must decode")
}

fn entries(table: &RewriteTable) -> Vec<(&str, &str)> {
    table.iter().collect()
}

async fn two_sites() -> (
    crate::Engine<FakeStore, FakeResolver>,
    ResourceId,
    ResourceId,
) {
    let store = FakeStore::default();
    store.put(mk_site("blog", "a", |_| {}));
    store.put(mk_site("blog", "b", |_| {}));
    let (engine, _) = mk_engine(store, resolver());
    let a = ResourceId::new("blog", "a");
    let b = ResourceId::new("blog", "b");
    converge(&engine, &a).await;
    converge(&engine, &b).await;
    converge(&engine, &a).await;
    (engine, a, b)
}

#[tokio::test]
async fn blog_team_a() {
    let store = FakeStore::default();
    store.put(mk_site("blog", "team-a", |s| {
        s.url = "/".to_string();
        s.image = "kwite:v2".to_string();
        s.min_replicas = 2;
        s.max_replicas = 5;
        s.port = 8080;
        s.template = "<h1>{{ .Title }}</h1>".to_string();
    }));
    let (engine, _) = mk_engine(store, resolver());
    let id = ResourceId::new("blog", "team-a");

    // The first pass creates the children; the service is not observable yet.
    engine.reconcile(&id).await.unwrap();
    let store = engine.store();

    let cm = store.configuration("blog", "team-a").unwrap();
    let data = cm.data.unwrap();
    assert_eq!(data["url"], "/");
    assert_eq!(data["template"], "<h1>{{ .Title }}</h1>");
    assert_eq!(data[REWRITE_KEY], "{}");

    let deploy = store.get_now::<Deployment>("blog", "team-a").unwrap();
    let spec = deploy.spec.unwrap();
    assert_eq!(spec.replicas, Some(2));
    assert_eq!(
        spec.template.spec.unwrap().containers[0].image.as_deref(),
        Some("kwite:v2")
    );

    let svc = store.get_now::<Service>("blog", "team-a").unwrap();
    assert_eq!(svc.spec.unwrap().ports.unwrap()[0].port, 8080);

    let hpa = store
        .get_now::<HorizontalPodAutoscaler>("blog", "team-a")
        .unwrap()
        .spec
        .unwrap();
    assert_eq!((hpa.min_replicas, hpa.max_replicas), (Some(2), 5));

    let status = store.site("blog", "team-a").unwrap().status.unwrap();
    assert_eq!(status.address, "");

    // The second pass observes the service and publishes its address.
    engine.reconcile(&id).await.unwrap();
    let status = store.site("blog", "team-a").unwrap().status.unwrap();
    assert_eq!(
        status,
        SiteStatus {
            address: "team-a.blog.svc.cluster.local:8080".to_string(),
            port: 8080,
            ..Default::default()
        }
    );
    assert_eq!(
        entries(&rewrite_table(store, "team-a")),
        vec![("team-a.blog", "team-a.blog.svc.cluster.local:8080")]
    );
}

#[tokio::test]
async fn siblings_share_a_rewrite_table() {
    let (engine, _, _) = two_sites().await;
    let want = vec![
        ("a.blog", "a.blog.svc.cluster.local:8080"),
        ("b.blog", "b.blog.svc.cluster.local:8080"),
    ];
    assert_eq!(entries(&rewrite_table(engine.store(), "a")), want);
    assert_eq!(entries(&rewrite_table(engine.store(), "b")), want);
}

#[tokio::test]
async fn new_site_is_seeded_from_siblings() {
    let (engine, _, _) = two_sites().await;
    engine.store().put(mk_site("blog", "c", |_| {}));
    engine
        .reconcile(&ResourceId::new("blog", "c"))
        .await
        .unwrap();

    assert_eq!(
        entries(&rewrite_table(engine.store(), "c")),
        vec![
            ("a.blog", "a.blog.svc.cluster.local:8080"),
            ("b.blog", "b.blog.svc.cluster.local:8080"),
        ]
    );
}

#[tokio::test]
async fn stale_entries_heal_from_either_site() {
    for healer in ["a", "b"] {
        let (engine, a, b) = two_sites().await;
        engine.store().edit::<ConfigMap>("blog", "b", |cm| {
            let mut table = rewrite::decode(cm).unwrap();
            table.upsert("a.blog", "10.0.0.1:80");
            cm.data
                .get_or_insert_with(Default::default)
                .insert(REWRITE_KEY.to_string(), table.encode());
        });

        let id = if healer == "a" { &a } else { &b };
        engine.reconcile(id).await.unwrap();
        assert_eq!(
            rewrite_table(engine.store(), "b").get("a.blog"),
            Some("a.blog.svc.cluster.local:8080"),
            "pass for {healer} must heal b's table"
        );
    }
}

#[tokio::test]
async fn deleted_site_is_pruned_by_survivors() {
    let (engine, a, b) = two_sites().await;

    // Garbage collection removes a's children along with it.
    engine.store().remove::<Site>("blog", "a");
    engine.store().remove::<ConfigMap>("blog", "a");
    engine.reconcile(&b).await.unwrap();

    assert_eq!(
        entries(&rewrite_table(engine.store(), "b")),
        vec![("b.blog", "b.blog.svc.cluster.local:8080")]
    );
    // A pass for the deleted site is a no-op.
    engine.store().take_writes();
    engine.reconcile(&a).await.unwrap();
    assert!(engine.store().writes().is_empty());
}

#[tokio::test]
async fn dns_failure_degrades_to_hostname() {
    let store = FakeStore::default();
    store.put(mk_site("blog", "offline", |_| {}));
    let (engine, _) = mk_engine(store, FakeResolver::default());
    let id = ResourceId::new("blog", "offline");
    converge(&engine, &id).await;

    let store = engine.store();
    for present in [
        store.get_now::<Deployment>("blog", "offline").is_some(),
        store.get_now::<Service>("blog", "offline").is_some(),
        store
            .get_now::<HorizontalPodAutoscaler>("blog", "offline")
            .is_some(),
    ] {
        assert!(present);
    }
    let status = store.site("blog", "offline").unwrap().status.unwrap();
    assert_eq!(status.address, "offline.blog");
    assert_eq!(
        entries(&rewrite_table(store, "offline")),
        vec![("offline.blog", "offline.blog")]
    );
}

#[tokio::test]
async fn malformed_sibling_table_does_not_fail_the_pass() {
    let (engine, a, _) = two_sites().await;
    engine.store().edit::<ConfigMap>("blog", "b", |cm| {
        cm.data
            .get_or_insert_with(Default::default)
            .insert(REWRITE_KEY.to_string(), "{\"a.blog\":".to_string());
    });
    engine
        .store()
        .edit::<Site>("blog", "a", |s| s.spec.port = 9090);

    let outcome = engine.reconcile(&a).await.unwrap();
    assert!(!outcome.requeue);
    let b = engine.store().configuration("blog", "b").unwrap();
    assert_eq!(b.data.unwrap()[REWRITE_KEY], "{\"a.blog\":");
}
