use crate::{
    controller::{self, Context, Leadership},
    dns::Resolver,
    k8s::{ConfigMap, SITE_LABEL},
    lease,
    reconcile::{Engine, KubeStore, OwnerIndex, ReconcileMetrics},
};
use anyhow::{bail, Result};
use clap::Parser;
use futures::prelude::*;
use kube::runtime::watcher;
use prometheus_client::registry::Registry;
use tokio::{sync::oneshot, time::Duration};
use tracing::{info, info_span, Instrument};

#[derive(Debug, Parser)]
#[clap(name = "site-controller", about = "A controller for Site resources")]
pub struct Args {
    #[clap(
        long,
        default_value = "site_controller=info,warn",
        env = "SITE_CONTROLLER_LOG"
    )]
    log_level: kubert::LogFilter,

    #[clap(long, default_value = "plain")]
    log_format: kubert::LogFormat,

    #[clap(flatten)]
    client: kubert::ClientArgs,

    #[clap(flatten)]
    admin: kubert::AdminArgs,

    /// Only reconciles while holding the write Lease.
    #[clap(long)]
    leader_election: bool,

    #[clap(long, default_value = "site-controller")]
    controller_deployment_name: String,

    #[clap(long, default_value = "site-controller")]
    controller_namespace: String,

    #[clap(long, default_value = "5000")]
    store_timeout_ms: u64,

    #[clap(long, default_value = "2000")]
    dns_timeout_ms: u64,

    /// How often a converged site is reconciled again.
    #[clap(long, default_value = "300")]
    resync_period_secs: u64,
}

impl Args {
    #[inline]
    pub async fn parse_and_run() -> Result<()> {
        Self::parse().run().await
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            admin,
            client,
            log_level,
            log_format,
            leader_election,
            controller_deployment_name,
            controller_namespace,
            store_timeout_ms,
            dns_timeout_ms,
            resync_period_secs,
        } = self;

        let mut prom = <Registry>::default();
        let registry = prom.sub_registry_with_prefix("site_controller");
        let metrics = ReconcileMetrics::register(registry);
        let rt_metrics = kubert::RuntimeMetrics::register(prom.sub_registry_with_prefix("kube"));

        let mut runtime = kubert::Runtime::builder()
            .with_log(log_level, log_format)
            .with_metrics(rt_metrics)
            .with_admin(admin.into_builder().with_prometheus(prom))
            .with_client(client)
            .build()
            .await?;

        let leadership = if leader_election {
            let hostname = match std::env::var("HOSTNAME") {
                Ok(hostname) => hostname,
                Err(_) => bail!("leader election requires the HOSTNAME environment variable"),
            };
            let claims = lease::init(
                &runtime,
                &controller_namespace,
                &controller_deployment_name,
                &hostname,
            )
            .await?;
            Leadership::Lease { hostname, claims }
        } else {
            Leadership::Always
        };

        // Index the ConfigMaps owned by Sites so that siblings can be listed
        // without scanning every ConfigMap in a namespace.
        let configurations = OwnerIndex::shared();
        let cms = runtime.watch_all::<ConfigMap>(watcher::Config::default().labels(SITE_LABEL));
        tokio::spawn(
            kubert::index::namespaced(configurations.clone(), cms)
                .instrument(info_span!("configmaps")),
        );

        let dns_timeout = Duration::from_millis(dns_timeout_ms);
        let store = KubeStore::new(
            runtime.client(),
            configurations,
            Duration::from_millis(store_timeout_ms),
        );
        let engine = Engine::new(
            store,
            Resolver::from_system_config(dns_timeout)?,
            metrics,
            dns_timeout,
        );
        let ctx = Context::new(
            engine,
            leadership,
            Duration::from_secs(resync_period_secs),
        );

        tokio::spawn(
            sites(runtime.client(), ctx, runtime.shutdown_handle())
                .instrument(info_span!("sites")),
        );

        // Block the main thread on the shutdown signal. Once it fires, wait for the background tasks to
        // complete before exiting.
        if runtime.run().await.is_err() {
            bail!("Aborted");
        }

        Ok(())
    }
}

async fn sites(
    client: kube::Client,
    ctx: std::sync::Arc<Context>,
    drain: kubert::shutdown::Watch,
) {
    let (close_tx, close_rx) = oneshot::channel();
    tokio::pin! {
        let ctrl = controller::run(client, ctx, close_rx.map(|_| {}));
    }

    info!("Site controller running");
    tokio::select! {
        () = (&mut ctrl) => {},
        handle = drain.signaled() => {
            let _ = close_tx.send(());
            handle.release_after(ctrl).await;
        }
    }
}
