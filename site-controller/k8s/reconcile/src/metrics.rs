use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{
        counter::Counter,
        family::Family,
        histogram::{exponential_buckets, Histogram},
    },
    registry::Registry,
};
use tokio::time;

#[derive(Clone, Debug)]
pub struct ReconcileMetrics {
    passes: Family<ResultLabels, Counter>,
    pass_duration: Histogram,
    child_writes: Family<WriteLabels, Counter>,
    child_errors: Family<KindLabels, Counter>,
    rewrite_updates: Family<ResultLabels, Counter>,
    status_writes: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ResultLabels {
    result: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct WriteLabels {
    kind: &'static str,
    op: &'static str,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct KindLabels {
    kind: &'static str,
}

// === impl ReconcileMetrics ===

impl ReconcileMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let passes = Family::<ResultLabels, Counter>::default();
        reg.register(
            "reconcile_passes",
            "Total number of site reconcile passes, by result",
            passes.clone(),
        );

        let pass_duration = Histogram::new(exponential_buckets(0.005, 2.0, 12));
        reg.register(
            "reconcile_pass_duration_seconds",
            "Time taken by a site reconcile pass",
            pass_duration.clone(),
        );

        let child_writes = Family::<WriteLabels, Counter>::default();
        reg.register(
            "child_writes",
            "Total number of child objects created or updated",
            child_writes.clone(),
        );

        let child_errors = Family::<KindLabels, Counter>::default();
        reg.register(
            "child_errors",
            "Total number of failed child reconciliations",
            child_errors.clone(),
        );

        let rewrite_updates = Family::<ResultLabels, Counter>::default();
        reg.register(
            "rewrite_updates",
            "Total number of rewrite table writes, by result",
            rewrite_updates.clone(),
        );

        let status_writes = Counter::default();
        reg.register(
            "status_writes",
            "Total number of site status updates",
            status_writes.clone(),
        );

        Self {
            passes,
            pass_duration,
            child_writes,
            child_errors,
            rewrite_updates,
            status_writes,
        }
    }

    pub(crate) fn pass(&self, result: &'static str, started: time::Instant) {
        self.passes.get_or_create(&ResultLabels { result }).inc();
        self.pass_duration
            .observe(started.elapsed().as_secs_f64());
    }

    pub(crate) fn child_write(&self, kind: &'static str, op: &'static str) {
        self.child_writes
            .get_or_create(&WriteLabels { kind, op })
            .inc();
    }

    pub(crate) fn child_error(&self, kind: &'static str) {
        self.child_errors.get_or_create(&KindLabels { kind }).inc();
    }

    pub(crate) fn rewrite_update(&self, result: &'static str) {
        self.rewrite_updates
            .get_or_create(&ResultLabels { result })
            .inc();
    }

    pub(crate) fn status_write(&self) {
        self.status_writes.inc();
    }

    #[cfg(test)]
    pub(crate) fn passes(&self, result: &'static str) -> u64 {
        self.passes.get_or_create(&ResultLabels { result }).get()
    }

    #[cfg(test)]
    pub(crate) fn rewrite_updates(&self, result: &'static str) -> u64 {
        self.rewrite_updates
            .get_or_create(&ResultLabels { result })
            .get()
    }

    #[cfg(test)]
    pub(crate) fn child_writes(&self, kind: &'static str, op: &'static str) -> u64 {
        self.child_writes
            .get_or_create(&WriteLabels { kind, op })
            .get()
    }
}

impl Default for ReconcileMetrics {
    fn default() -> Self {
        Self::register(&mut Registry::default())
    }
}
