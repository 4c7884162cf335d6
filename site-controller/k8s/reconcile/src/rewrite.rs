//! Maintenance of the URL rewrite table replicated in every configuration of a
//! namespace.
//!
//! Each site has one key in the table, `{name}.{namespace}`. A pass publishes
//! its own freshly resolved address and the addresses its siblings last
//! reported in their status, so a stale entry is corrected by whichever site
//! passes next. Keys of sites that no longer exist are pruned the same way.

use crate::{child::Pass, metrics::ReconcileMetrics, ownership, store::Store, Error, Result};
use site_controller_core::{ResourceId, RewriteTable, REWRITE_KEY};
use site_controller_k8s_api::{ConfigMap, Resource, ResourceExt};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// The outcome of a maintenance run.
#[derive(Debug, Default)]
pub(crate) struct Report {
    pub updated: usize,
    pub malformed: usize,
    pub failed: Vec<Error>,
}

/// Lists the configurations of every site in `namespace`, excluding those
/// pending deletion.
pub(crate) async fn list_sibling_configurations<S: Store>(
    store: &S,
    namespace: &str,
) -> Result<Vec<ConfigMap>> {
    let mut configurations = store.list_configurations(namespace).await?;
    configurations.retain(|cm| !ownership::is_deleting(cm.meta()));
    Ok(configurations)
}

/// Decodes the rewrite table of a configuration.
pub(crate) fn decode(cm: &ConfigMap) -> Result<RewriteTable> {
    let raw = cm.data.as_ref().and_then(|d| d.get(REWRITE_KEY));
    RewriteTable::decode(raw.map(String::as_str)).map_err(|source| Error::Decode {
        configuration: ResourceId::new(cm.namespace().unwrap_or_default(), cm.name_any()),
        source,
    })
}

/// Publishes the addresses of the namespace's sites to every sibling
/// configuration and prunes the entries of sites that are gone.
///
/// Configurations are updated independently: a malformed table or a failed
/// write is reported and the remaining configurations are still processed.
pub(crate) async fn maintain<S: Store>(
    store: &S,
    pass: &Pass<'_>,
    metrics: &ReconcileMetrics,
) -> Result<Report> {
    let namespace = pass.id.namespace.as_str();
    let configurations = list_sibling_configurations(store, namespace).await?;
    let mut live = HashSet::new();
    let mut published = BTreeMap::new();
    for site in store.list_sites(namespace).await? {
        if ownership::is_deleting(site.meta()) {
            continue;
        }
        let id = ResourceId::new(namespace, site.name_any());
        let address = if id == *pass.id {
            pass.address.to_string()
        } else {
            site.status.map(|s| s.address).unwrap_or_default()
        };
        if !address.is_empty() {
            published.insert(id.rewrite_key(), address);
        }
        live.insert(id);
    }

    let mut report = Report::default();
    for mut cm in configurations {
        let configuration = cm.name_any();
        let mut table = match decode(&cm) {
            Ok(table) => table,
            Err(error) => {
                warn!(%configuration, %error, "Skipping configuration with malformed rewrite table");
                report.malformed += 1;
                continue;
            }
        };

        let mut changed = false;
        for (key, address) in &published {
            if table.upsert(key.as_str(), address.as_str()) {
                debug!(%configuration, %key, %address, "Publishing address");
                changed = true;
            }
        }
        for stale in table.prune(namespace, &live) {
            info!(%configuration, key = %stale, "Removing entry of deleted site");
            changed = true;
        }
        if !changed {
            continue;
        }

        cm.data
            .get_or_insert_with(BTreeMap::new)
            .insert(REWRITE_KEY.to_string(), table.encode());
        match store.replace(&cm).await {
            Ok(_) => {
                info!(%configuration, entries = table.len(), "Updated rewrite table");
                metrics.rewrite_update("ok");
                report.updated += 1;
            }
            // Deleted since it was listed; its table went with it.
            Err(error) if error.is_not_found() => {
                debug!(%configuration, "Configuration is gone");
                metrics.rewrite_update("gone");
            }
            Err(error) => {
                let result = if error.is_conflict() { "conflict" } else { "error" };
                warn!(%configuration, %error, "Failed to update rewrite table");
                metrics.rewrite_update(result);
                report.failed.push(error);
            }
        }
    }
    Ok(report)
}
