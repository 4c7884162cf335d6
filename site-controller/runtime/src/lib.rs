#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub use site_controller_core as core;
pub use site_controller_k8s_api as k8s;
pub use site_controller_k8s_reconcile as reconcile;

mod args;
mod controller;
mod dns;
mod lease;

pub use self::{args::Args, dns::Resolver};
