use crate::child::{Child, Pass};
use site_controller_k8s_api::{
    apimachinery::pkg::util::intstr::IntOrString, site_labels, ObjectMeta, Service,
    ServicePort, ServiceSpec,
};
use tracing::warn;

const PORT_NAME: &str = "kwite-ext";

impl Child for Service {
    const KIND: &'static str = "NetworkService";

    fn desired(pass: &Pass<'_>, metadata: ObjectMeta) -> Self {
        let spec = &pass.site.spec;
        if !spec.visibility.is_supported() {
            warn!(visibility = %spec.visibility, "Unsupported visibility; exposing the site cluster-locally");
        }
        Service {
            metadata,
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(site_labels(&pass.id.name)),
                ports: Some(vec![ServicePort {
                    name: Some(PORT_NAME.to_string()),
                    protocol: Some("TCP".to_string()),
                    port: spec.port,
                    target_port: Some(IntOrString::Int(spec.container_port)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn apply(current: &mut Self, desired: &Self) -> bool {
        let Some(want) = desired
            .spec
            .as_ref()
            .and_then(|s| s.ports.as_ref())
            .and_then(|p| p.first())
        else {
            return false;
        };
        let spec = current.spec.get_or_insert_with(Default::default);
        let Some(have) = spec.ports.as_mut().and_then(|p| p.first_mut()) else {
            spec.ports = Some(vec![want.clone()]);
            return true;
        };

        let mut changed = false;
        if have.port != want.port {
            have.port = want.port;
            changed = true;
        }
        if have.target_port != want.target_port {
            have.target_port = want.target_port.clone();
            changed = true;
        }
        changed
    }
}

/// Returns the exposed port of a site's Service.
pub(crate) fn exposed_port(svc: &Service) -> Option<i32> {
    svc.spec.as_ref()?.ports.as_ref()?.first().map(|p| p.port)
}
