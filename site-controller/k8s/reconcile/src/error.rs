use site_controller_core::{DecodeError, ResourceId};
use site_controller_k8s_api::{self as k8s, ErrorResponse};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Kube(#[from] k8s::Error),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("cannot make site {site} the owner of {kind} {child}: {reason}")]
    Ownership {
        site: ResourceId,
        kind: &'static str,
        child: ResourceId,
        reason: &'static str,
    },

    #[error("{kind} is missing metadata.{field}")]
    MissingMetadata {
        kind: String,
        field: &'static str,
    },

    #[error("rewrite table of {configuration}: {source}")]
    Decode {
        configuration: ResourceId,
        #[source]
        source: DecodeError,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// === impl Error ===

impl Error {
    /// True if the store rejected a write because the object changed since it
    /// was read. Conflicts are transient and resolved by running the pass
    /// again.
    pub fn is_conflict(&self) -> bool {
        self.api_code() == Some(409)
    }

    pub fn is_not_found(&self) -> bool {
        self.api_code() == Some(404)
    }

    fn api_code(&self) -> Option<u16> {
        match self {
            Self::Kube(k8s::Error::Api(ErrorResponse { code, .. })) => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) fn api_error(code: u16, reason: &str) -> Error {
    Error::Kube(k8s::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{reason} ({code})"),
        reason: reason.to_string(),
        code,
    }))
}
