use crate::{
    child::{Child, Pass},
    rewrite,
    store::Store,
    Result,
};
use site_controller_core::{RewriteTable, REWRITE_KEY};
use site_controller_k8s_api::{ConfigMap, ObjectMeta};
use std::collections::BTreeMap;
use tracing::{debug, warn};

const URL_KEY: &str = "url";
const TEMPLATE_KEY: &str = "template";
const READY_KEY: &str = "ready";
const ALIVE_KEY: &str = "alive";

#[async_trait::async_trait]
impl Child for ConfigMap {
    const KIND: &'static str = "Configuration";

    fn desired(pass: &Pass<'_>, metadata: ObjectMeta) -> Self {
        let spec = &pass.site.spec;
        let data = [
            (URL_KEY, &spec.url),
            (TEMPLATE_KEY, &spec.template),
            (READY_KEY, &spec.ready),
            (ALIVE_KEY, &spec.alive),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
        ConfigMap {
            metadata,
            data: Some(data),
            ..Default::default()
        }
    }

    fn apply(current: &mut Self, desired: &Self) -> bool {
        let Some(want) = desired.data.as_ref() else {
            return false;
        };
        let data = current.data.get_or_insert_with(BTreeMap::new);
        let mut changed = false;
        for key in [URL_KEY, TEMPLATE_KEY, READY_KEY, ALIVE_KEY] {
            let Some(value) = want.get(key) else { continue };
            if data.get(key) != Some(value) {
                data.insert(key.to_string(), value.clone());
                changed = true;
            }
        }
        changed
    }

    /// Seeds the rewrite table of a new configuration with the entries already
    /// published by its siblings.
    async fn before_create<S: Store>(
        store: &S,
        pass: &Pass<'_>,
        desired: &mut Self,
    ) -> Result<()> {
        let mut table = RewriteTable::default();
        match rewrite::list_sibling_configurations(store, &pass.id.namespace).await {
            Ok(siblings) => {
                for cm in &siblings {
                    match rewrite::decode(cm) {
                        Ok(sibling) => table.merge_missing(&sibling),
                        Err(error) => debug!(%error, "Not seeding from malformed table"),
                    }
                }
            }
            Err(error) => {
                warn!(%error, "Failed to list sibling configurations; starting with an empty rewrite table")
            }
        }
        if !pass.address.is_empty() {
            table.upsert(pass.id.rewrite_key(), pass.address);
        }
        desired
            .data
            .get_or_insert_with(BTreeMap::new)
            .insert(REWRITE_KEY.to_string(), table.encode());
        Ok(())
    }
}
