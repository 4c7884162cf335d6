//! Reconciles Sites into their child objects.
//!
//! Every Site is materialized as four children named after it: a ConfigMap
//! (its configuration and a replica of the namespace's URL rewrite table), a
//! Deployment of page servers, a ClusterIP Service, and a
//! HorizontalPodAutoscaler. An [`Engine`] pass converges all four, keeps the
//! rewrite tables of the site's siblings current, and reports the observed
//! state in the Site's status.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

mod autoscaler;
mod child;
mod configuration;
mod engine;
mod error;
pub mod index;
mod metrics;
mod network_service;
pub mod ownership;
mod rewrite;
mod status;
pub mod store;
mod workload;


pub use self::{
    engine::{Engine, Outcome},
    error::{Error, Result},
    index::{OwnerIndex, SharedOwnerIndex},
    metrics::ReconcileMetrics,
    store::{KubeStore, Object, Store},
};
