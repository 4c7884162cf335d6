#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod address;
mod resource_id;
pub mod rewrite;

pub use self::{
    address::{resolve_address, Resolve, ResolveError},
    resource_id::ResourceId,
    rewrite::{DecodeError, RewriteTable},
};

/// The ConfigMap data key holding the serialized rewrite table.
pub const REWRITE_KEY: &str = "rewrite";
