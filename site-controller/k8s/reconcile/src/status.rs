use crate::{network_service, store::Store};
use site_controller_core::{resolve_address, Resolve, ResourceId};
use site_controller_k8s_api::{Deployment, HorizontalPodAutoscaler, Service, Site, SiteStatus};
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

/// The status observed at the start of a pass.
#[derive(Debug, Default)]
pub(crate) struct Observed {
    pub status: SiteStatus,

    /// Number of children that could not be read.
    pub failures: usize,
}

/// Reads the observed state of a site's children into its status.
///
/// Every child is read independently. A child that does not exist yet leaves
/// its fields as they were; a child that cannot be read is counted as a
/// failure and likewise leaves its fields untouched.
pub(crate) async fn observe<S: Store, R: Resolve>(
    store: &S,
    resolver: &R,
    dns_timeout: Duration,
    id: &ResourceId,
    site: &Site,
) -> Observed {
    let mut observed = Observed {
        status: site.status.clone().unwrap_or_default(),
        failures: 0,
    };
    let status = &mut observed.status;

    match store.get::<Deployment>(id).await {
        Ok(Some(deploy)) => {
            status.ready_replicas = deploy
                .status
                .and_then(|s| s.ready_replicas)
                .unwrap_or(0);
            status.ready = status.ready_replicas == site.spec.min_replicas;
        }
        Ok(None) => debug!("Workload not found"),
        Err(error) => {
            warn!(%error, "Failed to read workload");
            observed.failures += 1;
        }
    }

    match store.get::<HorizontalPodAutoscaler>(id).await {
        Ok(Some(hpa)) => {
            if let Some(s) = hpa.status {
                status.current_replicas = s.current_replicas;
                status.desired_replicas = s.desired_replicas;
            }
        }
        Ok(None) => debug!("Autoscaler not found"),
        Err(error) => {
            warn!(%error, "Failed to read autoscaler");
            observed.failures += 1;
        }
    }

    match store.get::<Service>(id).await {
        Ok(Some(svc)) => {
            if let Some(port) = network_service::exposed_port(&svc) {
                status.port = port;
                status.address = resolve(resolver, dns_timeout, id, port).await;
            }
        }
        Ok(None) => debug!("Network service not found"),
        Err(error) => {
            warn!(%error, "Failed to read network service");
            observed.failures += 1;
        }
    }

    observed
}

async fn resolve<R: Resolve>(resolver: &R, timeout: Duration, id: &ResourceId, port: i32) -> String {
    let host = id.rewrite_key();
    match time::timeout(timeout, resolve_address(resolver, &host, port)).await {
        Ok(address) => address,
        Err(_) => {
            warn!(%host, ?timeout, "Address resolution timed out");
            host
        }
    }
}
