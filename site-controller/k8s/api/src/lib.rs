#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod labels;
pub mod site;

pub use self::{
    labels::{site_labels, SITE_LABEL},
    site::{Site, SiteSpec, SiteStatus, Visibility},
};
pub use k8s_openapi::{
    api::{
        self,
        apps::v1::{Deployment, DeploymentSpec, DeploymentStatus},
        autoscaling::v1::{
            CrossVersionObjectReference, HorizontalPodAutoscaler, HorizontalPodAutoscalerSpec,
            HorizontalPodAutoscalerStatus,
        },
        core::v1::{
            ConfigMap, Container, ContainerPort, LocalObjectReference, SecurityContext, Service,
            ServicePort, ServiceSpec,
        },
    },
    apimachinery::{
        self,
        pkg::apis::meta::v1::{OwnerReference, Time},
    },
    NamespaceResourceScope,
};
pub use kube::{
    api::{Api, ListParams, ObjectMeta, Patch, PatchParams, PostParams, ResourceExt},
    error::ErrorResponse,
    Client, Error, Resource,
};
