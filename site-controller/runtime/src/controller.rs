use crate::{
    dns::Resolver,
    k8s::{
        Api, Client, ConfigMap, Deployment, HorizontalPodAutoscaler, ResourceExt, Service, Site,
        SITE_LABEL,
    },
    lease::Claims,
    reconcile::{Engine, Error, KubeStore, Outcome},
};
use ahash::AHashMap as HashMap;
use futures::prelude::*;
use kube::runtime::{controller::Action, watcher, Controller};
use parking_lot::Mutex;
use site_controller_core::ResourceId;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, trace};

/// Requeue delay after a pass that asked to run again.
const REQUEUE_DELAY: Duration = Duration::from_secs(5);

/// Requeue delay while another replica holds the write lease.
const FOLLOWER_DELAY: Duration = Duration::from_secs(10);

const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(5 * 60);

pub struct Context {
    engine: Engine<KubeStore, Resolver>,
    leadership: Leadership,
    backoff: Backoff,
    resync: Duration,
}

/// Decides whether this replica may write.
pub enum Leadership {
    /// Leader election is disabled.
    Always,
    Lease { hostname: String, claims: Claims },
}

/// Per-site exponential backoff after failed passes.
#[derive(Debug, Default)]
struct Backoff {
    failures: Mutex<HashMap<ResourceId, u32>>,
}

// === impl Context ===

impl Context {
    pub fn new(
        engine: Engine<KubeStore, Resolver>,
        leadership: Leadership,
        resync: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            leadership,
            backoff: Backoff::default(),
            resync,
        })
    }
}

/// Runs the Site controller until `shutdown` completes.
pub async fn run(
    client: Client,
    ctx: Arc<Context>,
    shutdown: impl Future<Output = ()> + Send + Sync + 'static,
) {
    let children = || watcher::Config::default().labels(SITE_LABEL);
    Controller::new(Api::<Site>::all(client.clone()), watcher::Config::default())
        .owns(Api::<ConfigMap>::all(client.clone()), children())
        .owns(Api::<Deployment>::all(client.clone()), children())
        .owns(Api::<Service>::all(client.clone()), children())
        .owns(Api::<HorizontalPodAutoscaler>::all(client), children())
        .graceful_shutdown_on(shutdown)
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((site, _)) => trace!(namespace = ?site.namespace, name = %site.name, "Reconciled"),
                Err(error) => debug!(%error, "Reconcile error"),
            }
        })
        .await;
    info!("Site controller stopped");
}

async fn reconcile(site: Arc<Site>, ctx: Arc<Context>) -> Result<Action, Error> {
    if !ctx.leadership.is_leader() {
        trace!(name = %site.name_any(), "Not the lease holder; skipping");
        return Ok(Action::requeue(requeue_after(None, ctx.resync)));
    }

    let id = ResourceId::new(site.namespace().unwrap_or_default(), site.name_any());
    let outcome = ctx.engine.reconcile(&id).await?;
    ctx.backoff.reset(&id);
    Ok(Action::requeue(requeue_after(Some(&outcome), ctx.resync)))
}

/// The delay before a site's next pass. `None` means the pass was skipped
/// because another replica holds the lease.
fn requeue_after(outcome: Option<&Outcome>, resync: Duration) -> Duration {
    match outcome {
        None => FOLLOWER_DELAY,
        Some(Outcome { requeue: true }) => REQUEUE_DELAY,
        Some(Outcome { requeue: false }) => resync,
    }
}

fn error_policy(site: Arc<Site>, _error: &Error, ctx: Arc<Context>) -> Action {
    let id = ResourceId::new(site.namespace().unwrap_or_default(), site.name_any());
    Action::requeue(ctx.backoff.next(&id))
}

// === impl Leadership ===

impl Leadership {
    fn is_leader(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Lease { hostname, claims } => claims.borrow().is_current_for(hostname),
        }
    }
}

// === impl Backoff ===

impl Backoff {
    /// Records a failure of `id` and returns the delay before its next pass.
    fn next(&self, id: &ResourceId) -> Duration {
        let mut failures = self.failures.lock();
        let n = failures.entry(id.clone()).or_default();
        *n = n.saturating_add(1);
        let factor = 2u32.saturating_pow(n.saturating_sub(1).min(16));
        BACKOFF_MIN.saturating_mul(factor).min(BACKOFF_MAX)
    }

    fn reset(&self, id: &ResourceId) {
        self.failures.lock().remove(id);
    }
}
