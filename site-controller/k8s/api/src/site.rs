use k8s_openapi::api::core::v1::{LocalObjectReference, SecurityContext};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Describes a single web-serving workload: the URL it handles, the page
/// server image and its templates, and how it scales.
///
/// The controller materializes a ConfigMap, a Deployment, a Service and a
/// HorizontalPodAutoscaler for every Site, all named after it.
#[derive(Clone, Debug, PartialEq, CustomResource, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "web.kwite.site",
    version = "v1beta1",
    kind = "Site",
    status = "SiteStatus",
    shortname = "site",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct SiteSpec {
    /// The URL path handled by the site's page servers.
    #[serde(default = "default_url")]
    pub url: String,

    /// How the site is exposed.
    #[serde(default)]
    pub visibility: Visibility,

    /// Container image of the page server.
    #[serde(default = "default_image")]
    pub image: String,

    /// The port on which the URL is exposed by the site's Service.
    #[serde(default = "default_port")]
    pub port: i32,

    /// The port the page server container listens on.
    #[serde(default = "default_port")]
    pub container_port: i32,

    #[serde(default = "default_replicas")]
    pub min_replicas: i32,

    #[serde(default = "default_replicas")]
    pub max_replicas: i32,

    /// Memory request, e.g. `128Mi`.
    #[serde(default = "default_memory")]
    pub memory: String,

    /// CPU request, e.g. `200m`.
    #[serde(default = "default_cpu")]
    pub cpu: String,

    /// Autoscaler CPU utilization target, in percent.
    #[serde(default = "default_target_cpu")]
    pub target_cpu: i32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_context: Option<SecurityContext>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_pull_secrets: Option<Vec<LocalObjectReference>>,

    /// Page render template.
    #[serde(default)]
    pub template: String,

    /// Readiness probe template.
    #[serde(default)]
    pub ready: String,

    /// Liveness probe template.
    #[serde(default)]
    pub alive: String,
}

/// How a site is made reachable.
///
/// Only `ClusterLocal` is implemented; the other classes are accepted and
/// exposed cluster-locally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub enum Visibility {
    #[default]
    ClusterLocal,
    Ingress,
    LoadBalancer,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatus {
    /// The resolved address on which the URL is exposed. Empty until the
    /// site's Service has been observed.
    #[serde(default)]
    pub address: String,

    /// The Service port on which the URL is exposed.
    #[serde(default)]
    pub port: i32,

    #[serde(default)]
    pub ready_replicas: i32,

    /// Replica count last reported by the autoscaler.
    #[serde(default)]
    pub current_replicas: i32,

    /// Replica count last requested by the autoscaler.
    #[serde(default)]
    pub desired_replicas: i32,

    /// True when the ready replica count equals the declared minimum.
    #[serde(default)]
    pub ready: bool,
}

// === impl Visibility ===

impl Visibility {
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::ClusterLocal)
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ClusterLocal => "ClusterLocal".fmt(f),
            Self::Ingress => "Ingress".fmt(f),
            Self::LoadBalancer => "LoadBalancer".fmt(f),
        }
    }
}

fn default_url() -> String {
    "/".to_string()
}

fn default_image() -> String {
    "kwite:latest".to_string()
}

fn default_port() -> i32 {
    8080
}

fn default_replicas() -> i32 {
    1
}

fn default_memory() -> String {
    "64Mi".to_string()
}

fn default_cpu() -> String {
    "200m".to_string()
}

fn default_target_cpu() -> i32 {
    80
}
