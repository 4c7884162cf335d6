use crate::{
    child::{self, Child, Pass},
    metrics::ReconcileMetrics,
    ownership, rewrite, status,
    store::Store,
    Result,
};
use site_controller_core::{Resolve, ResourceId};
use site_controller_k8s_api::{
    ConfigMap, Deployment, HorizontalPodAutoscaler, Resource, Service, Site,
};
use std::time::Duration;
use tokio::time;
use tracing::{debug, error, info_span, warn, Instrument};

/// Drives a single Site toward its declared state.
///
/// The engine holds no per-site state between passes: every pass reads the
/// site and its children fresh, so a pass can be repeated at any time.
pub struct Engine<S, R> {
    store: S,
    resolver: R,
    metrics: ReconcileMetrics,
    dns_timeout: Duration,
}

/// The result of a successful pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// Set when a part of the pass failed in a way that another pass is
    /// expected to fix, e.g. a write conflict.
    pub requeue: bool,
}

// === impl Engine ===

impl<S: Store, R: Resolve> Engine<S, R> {
    pub fn new(store: S, resolver: R, metrics: ReconcileMetrics, dns_timeout: Duration) -> Self {
        Self {
            store,
            resolver,
            metrics,
            dns_timeout,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one reconcile pass for the site `id`.
    ///
    /// A site that no longer exists, or that is being deleted, is already
    /// converged. Failures to converge an individual child are logged and
    /// reported through [`Outcome::requeue`]; only failures to read the site
    /// or to write its status fail the pass.
    pub async fn reconcile(&self, id: &ResourceId) -> Result<Outcome> {
        let span = info_span!("site", namespace = %id.namespace, name = %id.name);
        let started = time::Instant::now();
        let res = self.reconcile_site(id).instrument(span.clone()).await;
        let result = match &res {
            Ok(Outcome { requeue: true, .. }) => "requeue",
            Ok(_) => "ok",
            Err(error) => {
                span.in_scope(|| error!(%error, "Reconcile failed"));
                "error"
            }
        };
        self.metrics.pass(result, started);
        res
    }

    async fn reconcile_site(&self, id: &ResourceId) -> Result<Outcome> {
        let Some(site) = self.store.get::<Site>(id).await? else {
            debug!("Site not found");
            return Ok(Outcome::default());
        };
        if ownership::is_deleting(site.meta()) {
            debug!("Site is being deleted");
            return Ok(Outcome::default());
        }

        let observed =
            status::observe(&self.store, &self.resolver, self.dns_timeout, id, &site).await;
        let mut outcome = Outcome {
            requeue: observed.failures > 0,
        };

        let pass = Pass {
            id,
            site: &site,
            address: &observed.status.address,
        };
        outcome.requeue |= !self.child::<Service>(&pass).await;
        outcome.requeue |= !self.child::<ConfigMap>(&pass).await;
        outcome.requeue |= !self.rewrite(&pass).await;
        outcome.requeue |= !self.child::<Deployment>(&pass).await;
        outcome.requeue |= !self.child::<HorizontalPodAutoscaler>(&pass).await;

        if site.status.as_ref() != Some(&observed.status) {
            self.store.patch_site_status(&site, &observed.status).await?;
            self.metrics.status_write();
            debug!(status = ?observed.status, "Updated status");
        } else if !outcome.requeue {
            debug!("Already converged");
        }

        Ok(outcome)
    }

    /// Returns false if the child could not be converged.
    async fn child<K: Child>(&self, pass: &Pass<'_>) -> bool {
        match child::reconcile::<K, S>(&self.store, pass).await {
            Ok(applied) => {
                if let Some(op) = applied.op() {
                    self.metrics.child_write(K::KIND, op);
                }
                true
            }
            Err(error) => {
                warn!(kind = K::KIND, %error, "Failed to reconcile child");
                self.metrics.child_error(K::KIND);
                false
            }
        }
    }

    /// Returns false if a configuration could not be updated.
    async fn rewrite(&self, pass: &Pass<'_>) -> bool {
        match rewrite::maintain(&self.store, pass, &self.metrics).await {
            Ok(report) => {
                debug!(
                    updated = report.updated,
                    malformed = report.malformed,
                    failed = report.failed.len(),
                    "Maintained rewrite tables"
                );
                report.failed.is_empty()
            }
            Err(error) => {
                warn!(%error, "Failed to maintain rewrite tables");
                false
            }
        }
    }
}
