use crate::ownership;
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use parking_lot::RwLock;
use site_controller_k8s_api::{ConfigMap, Resource, ResourceExt};
use std::sync::Arc;

pub type SharedOwnerIndex = Arc<RwLock<OwnerIndex>>;

/// Tracks which ConfigMaps are controlled by a Site, per namespace.
#[derive(Debug, Default)]
pub struct OwnerIndex {
    namespaces: HashMap<String, HashSet<String>>,
}

// === impl OwnerIndex ===

impl OwnerIndex {
    pub fn shared() -> SharedOwnerIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Returns the names of the Site-controlled ConfigMaps in `namespace`, in
    /// name order.
    pub fn configurations(&self, namespace: &str) -> Vec<String> {
        let mut names = self
            .namespaces
            .get(namespace)
            .map(|cms| cms.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl kubert::index::IndexNamespacedResource<ConfigMap> for OwnerIndex {
    fn apply(&mut self, cm: ConfigMap) {
        let namespace = cm.namespace().unwrap_or_default();
        let name = cm.name_any();
        match ownership::site_owner(cm.meta()) {
            Some(site) => {
                tracing::trace!(%namespace, %name, %site, "Indexing configuration");
                self.namespaces
                    .entry(namespace)
                    .or_default()
                    .insert(name);
            }
            // Ownership may have been removed from a previously indexed map.
            None => self.delete(namespace, name),
        }
    }

    fn delete(&mut self, namespace: String, name: String) {
        if let Some(cms) = self.namespaces.get_mut(&namespace) {
            cms.remove(&name);
            if cms.is_empty() {
                self.namespaces.remove(&namespace);
            }
        }
    }
}
