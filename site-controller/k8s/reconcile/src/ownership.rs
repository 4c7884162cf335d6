use crate::{Error, Result};
use site_controller_core::ResourceId;
use site_controller_k8s_api::{site_labels, ObjectMeta, Resource, ResourceExt, Site};

/// Builds the metadata of a child named `id`, controlled by `site`.
///
/// The child lives in the site's namespace, carries the site label, and
/// references the site as its controlling owner so that it is garbage
/// collected with it.
pub(crate) fn child_meta(site: &Site, id: &ResourceId, kind: &'static str) -> Result<ObjectMeta> {
    let refuse = |reason| Error::Ownership {
        site: ResourceId::new(site.namespace().unwrap_or_default(), site.name_any()),
        kind,
        child: id.clone(),
        reason,
    };

    if site.namespace().as_deref() != Some(id.namespace.as_str()) {
        return Err(refuse("owner and child must share a namespace"));
    }
    let mut owner = site
        .controller_owner_ref(&())
        .ok_or_else(|| refuse("owner has no name or uid"))?;
    owner.block_owner_deletion = Some(true);

    Ok(ObjectMeta {
        namespace: Some(id.namespace.clone()),
        name: Some(id.name.clone()),
        labels: Some(site_labels(&site.name_any())),
        owner_references: Some(vec![owner]),
        ..Default::default()
    })
}

/// Returns the name of the Site that controls an object, if any.
pub fn site_owner(meta: &ObjectMeta) -> Option<&str> {
    let api_version = Site::api_version(&());
    let kind = Site::kind(&());
    meta.owner_references
        .iter()
        .flatten()
        .find(|oref| {
            oref.controller == Some(true) && oref.kind == kind && oref.api_version == api_version
        })
        .map(|oref| oref.name.as_str())
}

pub(crate) fn is_deleting(meta: &ObjectMeta) -> bool {
    meta.deletion_timestamp.is_some()
}
