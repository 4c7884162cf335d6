use crate::{
    ownership,
    store::{Object, Store},
    Result,
};
use site_controller_core::ResourceId;
use site_controller_k8s_api::{ObjectMeta, Site};
use tracing::{debug, info};

/// The state shared by every step of a single reconcile pass.
#[derive(Debug)]
pub(crate) struct Pass<'a> {
    pub id: &'a ResourceId,
    pub site: &'a Site,

    /// The site's address as resolved at the start of the pass. Empty if the
    /// site's Service has not been observed yet.
    pub address: &'a str,
}

/// A kind of object materialized for every Site.
#[async_trait::async_trait]
pub(crate) trait Child: Object {
    const KIND: &'static str;

    /// Builds the desired object for the pass.
    fn desired(pass: &Pass<'_>, metadata: ObjectMeta) -> Self;

    /// Copies the reconciled fields of `desired` into `current`. Returns true
    /// if `current` changed.
    fn apply(current: &mut Self, desired: &Self) -> bool;

    /// Prepares a desired object before it is first created.
    async fn before_create<S: Store>(
        _store: &S,
        _pass: &Pass<'_>,
        _desired: &mut Self,
    ) -> Result<()> {
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Applied {
    Created,
    Updated,
    Unchanged,
    Deleting,
}

/// Converges the child of kind `K` named after the pass's site.
///
/// A missing child is created. A child pending deletion is left alone. An
/// existing child is written only if one of its reconciled fields drifted.
pub(crate) async fn reconcile<K: Child, S: Store>(store: &S, pass: &Pass<'_>) -> Result<Applied> {
    let Some(mut current) = store.get::<K>(pass.id).await? else {
        let metadata = ownership::child_meta(pass.site, pass.id, K::KIND)?;
        let mut desired = K::desired(pass, metadata);
        K::before_create(store, pass, &mut desired).await?;
        store.create(&desired).await?;
        info!(kind = K::KIND, "Created");
        return Ok(Applied::Created);
    };

    if ownership::is_deleting(current.meta()) {
        debug!(kind = K::KIND, "Pending deletion");
        return Ok(Applied::Deleting);
    }

    let desired = K::desired(pass, ObjectMeta::default());
    if !K::apply(&mut current, &desired) {
        return Ok(Applied::Unchanged);
    }
    store.replace(&current).await?;
    info!(kind = K::KIND, "Updated");
    Ok(Applied::Updated)
}

impl Applied {
    pub(crate) fn op(&self) -> Option<&'static str> {
        match self {
            Self::Created => Some("create"),
            Self::Updated => Some("update"),
            Self::Unchanged | Self::Deleting => None,
        }
    }
}
