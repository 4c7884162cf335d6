use crate::child::{Child, Pass};
use site_controller_k8s_api::{
    CrossVersionObjectReference, Deployment, HorizontalPodAutoscaler,
    HorizontalPodAutoscalerSpec, ObjectMeta, Resource,
};

impl Child for HorizontalPodAutoscaler {
    const KIND: &'static str = "Autoscaler";

    fn desired(pass: &Pass<'_>, metadata: ObjectMeta) -> Self {
        let spec = &pass.site.spec;
        HorizontalPodAutoscaler {
            metadata,
            spec: Some(HorizontalPodAutoscalerSpec {
                scale_target_ref: CrossVersionObjectReference {
                    api_version: Some(Deployment::api_version(&()).to_string()),
                    kind: Deployment::kind(&()).to_string(),
                    name: pass.id.name.clone(),
                },
                min_replicas: Some(spec.min_replicas),
                max_replicas: spec.max_replicas,
                target_cpu_utilization_percentage: Some(spec.target_cpu),
            }),
            ..Default::default()
        }
    }

    fn apply(current: &mut Self, desired: &Self) -> bool {
        let Some(want) = desired.spec.as_ref() else {
            return false;
        };
        let Some(have) = current.spec.as_mut() else {
            current.spec = Some(want.clone());
            return true;
        };

        let mut changed = false;
        if have.min_replicas != want.min_replicas {
            have.min_replicas = want.min_replicas;
            changed = true;
        }
        if have.max_replicas != want.max_replicas {
            have.max_replicas = want.max_replicas;
            changed = true;
        }
        if have.target_cpu_utilization_percentage != want.target_cpu_utilization_percentage {
            have.target_cpu_utilization_percentage = want.target_cpu_utilization_percentage;
            changed = true;
        }
        changed
    }
}
