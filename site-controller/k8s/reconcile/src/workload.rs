use crate::child::{Child, Pass};
use site_controller_k8s_api::{
    api::core::v1::{
        ConfigMapVolumeSource, HTTPGetAction, PodSpec, PodTemplateSpec, Probe,
        ResourceRequirements, Volume, VolumeMount,
    },
    apimachinery::pkg::{
        api::resource::Quantity, apis::meta::v1::LabelSelector, util::intstr::IntOrString,
    },
    site_labels, Container, ContainerPort, Deployment, DeploymentSpec, ObjectMeta,
};

pub(crate) const CONTAINER_NAME: &str = "kwite";
const PORT_NAME: &str = "kwite";
const CONFIG_VOLUME: &str = "configs";
const CONFIG_MOUNT_PATH: &str = "/configs";

impl Child for Deployment {
    const KIND: &'static str = "Workload";

    fn desired(pass: &Pass<'_>, metadata: ObjectMeta) -> Self {
        let spec = &pass.site.spec;
        let labels = site_labels(&pass.id.name);

        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(spec.image.clone()),
            ports: Some(vec![ContainerPort {
                name: Some(PORT_NAME.to_string()),
                container_port: spec.container_port,
                ..Default::default()
            }]),
            resources: Some(ResourceRequirements {
                requests: Some(
                    [
                        ("cpu".to_string(), Quantity(spec.cpu.clone())),
                        ("memory".to_string(), Quantity(spec.memory.clone())),
                    ]
                    .into_iter()
                    .collect(),
                ),
                ..Default::default()
            }),
            security_context: spec.security_context.clone(),
            volume_mounts: Some(vec![VolumeMount {
                name: CONFIG_VOLUME.to_string(),
                mount_path: CONFIG_MOUNT_PATH.to_string(),
                ..Default::default()
            }]),
            startup_probe: Some(Probe {
                failure_threshold: Some(5),
                period_seconds: Some(1),
                ..http_probe(&spec.url, "kwitealive")
            }),
            liveness_probe: Some(Probe {
                period_seconds: Some(3),
                ..http_probe(&spec.url, "kwitealive")
            }),
            readiness_probe: Some(Probe {
                period_seconds: Some(3),
                ..http_probe(&spec.url, "kwiteready")
            }),
            ..Default::default()
        };

        Deployment {
            metadata,
            spec: Some(DeploymentSpec {
                // Only set at creation; the autoscaler owns the replica count.
                replicas: Some(spec.min_replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        image_pull_secrets: spec.image_pull_secrets.clone(),
                        volumes: Some(vec![Volume {
                            name: CONFIG_VOLUME.to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: pass.id.name.clone(),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn apply(current: &mut Self, desired: &Self) -> bool {
        let Some(want) = container(desired) else {
            return false;
        };
        let pod = current
            .spec
            .get_or_insert_with(Default::default)
            .template
            .spec
            .get_or_insert_with(Default::default);

        let Some(have) = pod.containers.first_mut() else {
            pod.containers = vec![want.clone()];
            return true;
        };

        let mut changed = false;
        if have.image != want.image {
            have.image = want.image.clone();
            changed = true;
        }

        let want_port = want.ports.iter().flatten().next();
        match (have.ports.as_mut().and_then(|p| p.first_mut()), want_port) {
            (Some(port), Some(want_port)) => {
                if port.container_port != want_port.container_port {
                    port.container_port = want_port.container_port;
                    changed = true;
                }
            }
            (None, Some(_)) => {
                have.ports = want.ports.clone();
                changed = true;
            }
            (_, None) => {}
        }

        changed
    }
}

fn container(deployment: &Deployment) -> Option<&Container> {
    deployment
        .spec
        .as_ref()?
        .template
        .spec
        .as_ref()?
        .containers
        .first()
}

fn http_probe(url: &str, check: &str) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(format!("{}/{check}", url.trim_end_matches('/'))),
            port: IntOrString::String(PORT_NAME.to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}
