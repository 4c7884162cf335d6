use crate::{index::SharedOwnerIndex, Error, Result};
use serde::{de::DeserializeOwned, Serialize};
use site_controller_core::ResourceId;
use site_controller_k8s_api::{
    self as k8s, Api, ConfigMap, ListParams, NamespaceResourceScope, Patch, PatchParams,
    PostParams, Resource, ResourceExt, Site, SiteStatus,
};
use std::{fmt, future::Future, time::Duration};
use tokio::time;

/// Any namespaced Kubernetes object the controller reads or writes.
pub trait Object:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + DeserializeOwned
    + Serialize
    + Send
    + Sync
    + 'static
{
}

impl<T> Object for T where
    T: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + DeserializeOwned
        + Serialize
        + Send
        + Sync
        + 'static
{
}

/// The object store seen by a reconcile pass.
///
/// Writes carry the resource version of the object they were derived from and
/// fail with a conflict if the stored object has changed since it was read.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns `None` if the object does not exist.
    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>>;

    async fn create<K: Object>(&self, obj: &K) -> Result<K>;

    async fn replace<K: Object>(&self, obj: &K) -> Result<K>;

    async fn list_sites(&self, namespace: &str) -> Result<Vec<Site>>;

    /// Lists every ConfigMap in `namespace` that is controlled by a Site.
    async fn list_configurations(&self, namespace: &str) -> Result<Vec<ConfigMap>>;

    /// Writes `status` to the site's status subresource, conditioned on the
    /// site's resource version.
    async fn patch_site_status(&self, site: &Site, status: &SiteStatus) -> Result<()>;
}

/// A [`Store`] backed by the Kubernetes API.
///
/// Configuration listings are served from an ownership index fed by a watch,
/// and each listed object is then read from the API so that every write is
/// based on a fresh resource version.
#[derive(Clone)]
pub struct KubeStore {
    client: k8s::Client,
    configurations: SharedOwnerIndex,
    timeout: Duration,
}

// === impl KubeStore ===

impl KubeStore {
    pub fn new(client: k8s::Client, configurations: SharedOwnerIndex, timeout: Duration) -> Self {
        Self {
            client,
            configurations,
            timeout,
        }
    }

    fn api<K: Object>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, k8s::Error>>,
    ) -> Result<T> {
        match time::timeout(self.timeout, fut).await {
            Ok(res) => res.map_err(Into::into),
            Err(_) => Err(Error::Timeout {
                operation,
                timeout: self.timeout,
            }),
        }
    }
}

fn object_id<K: Object>(obj: &K) -> Result<ResourceId> {
    let missing = |field| Error::MissingMetadata {
        kind: K::kind(&()).to_string(),
        field,
    };
    let namespace = obj.meta().namespace.clone().ok_or_else(|| missing("namespace"))?;
    let name = obj.meta().name.clone().ok_or_else(|| missing("name"))?;
    Ok(ResourceId::new(namespace, name))
}

#[async_trait::async_trait]
impl Store for KubeStore {
    async fn get<K: Object>(&self, id: &ResourceId) -> Result<Option<K>> {
        self.timed("get", self.api::<K>(&id.namespace).get_opt(&id.name))
            .await
    }

    async fn create<K: Object>(&self, obj: &K) -> Result<K> {
        let id = object_id(obj)?;
        self.timed(
            "create",
            self.api::<K>(&id.namespace)
                .create(&PostParams::default(), obj),
        )
        .await
    }

    async fn replace<K: Object>(&self, obj: &K) -> Result<K> {
        let id = object_id(obj)?;
        self.timed(
            "replace",
            self.api::<K>(&id.namespace)
                .replace(&id.name, &PostParams::default(), obj),
        )
        .await
    }

    async fn list_sites(&self, namespace: &str) -> Result<Vec<Site>> {
        let list = self
            .timed(
                "list",
                self.api::<Site>(namespace).list(&ListParams::default()),
            )
            .await?;
        Ok(list.items)
    }

    async fn list_configurations(&self, namespace: &str) -> Result<Vec<ConfigMap>> {
        let names = self.configurations.read().configurations(namespace);
        let mut configurations = Vec::with_capacity(names.len());
        for name in names {
            let id = ResourceId::new(namespace, name);
            // The index may lag behind deletions.
            if let Some(cm) = self.get::<ConfigMap>(&id).await? {
                configurations.push(cm);
            }
        }
        Ok(configurations)
    }

    async fn patch_site_status(&self, site: &Site, status: &SiteStatus) -> Result<()> {
        let id = object_id(site)?;
        let patch = serde_json::json!({
            "apiVersion": Site::api_version(&()),
            "kind": Site::kind(&()),
            "metadata": {
                "name": id.name,
                "resourceVersion": site.resource_version(),
            },
            "status": status,
        });
        self.timed(
            "patch status",
            self.api::<Site>(&id.namespace).patch_status(
                &id.name,
                &PatchParams::default(),
                &Patch::Merge(patch),
            ),
        )
        .await?;
        Ok(())
    }
}
