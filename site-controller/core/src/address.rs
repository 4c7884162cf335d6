//! Resolves a site's hostname key to the address published in rewrite tables.

use std::net::IpAddr;
use tracing::{debug, info, warn};

/// Forward and reverse name lookups.
#[async_trait::async_trait]
pub trait Resolve: Send + Sync {
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError>;

    /// Returns the names registered for `ip`, possibly with a trailing root
    /// label dot.
    async fn lookup_addr(&self, ip: IpAddr) -> Result<Vec<String>, ResolveError>;
}

#[derive(Debug, thiserror::Error)]
#[error("failed to resolve {target}: {reason}")]
pub struct ResolveError {
    pub target: String,
    pub reason: String,
}

impl ResolveError {
    pub fn new(target: impl ToString, reason: impl ToString) -> Self {
        Self {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Resolves `host` to `{fqdn}:{port}`.
///
/// The first IPv4 result of the forward lookup is reverse-resolved and the
/// longest returned name wins; on equal length the first one is kept. Any
/// failure along the way returns `host` unchanged, without a port, so that a
/// DNS outage never blocks the rest of a reconcile pass.
pub async fn resolve_address<R: Resolve + ?Sized>(resolver: &R, host: &str, port: i32) -> String {
    let ips = match resolver.lookup_ip(host).await {
        Ok(ips) => ips,
        Err(error) => {
            warn!(%host, %error, "Forward lookup failed");
            return host.to_string();
        }
    };

    let Some(ip) = ips.into_iter().find(IpAddr::is_ipv4) else {
        debug!(%host, "No IPv4 address found");
        return host.to_string();
    };

    let names = match resolver.lookup_addr(ip).await {
        Ok(names) => names,
        Err(error) => {
            warn!(%host, %ip, %error, "Reverse lookup failed");
            return host.to_string();
        }
    };

    let mut fqdn = "";
    for name in &names {
        debug!(%host, %name, "Found fqdn");
        if name.len() > fqdn.len() {
            fqdn = name.as_str();
        }
    }
    let fqdn = fqdn.strip_suffix('.').unwrap_or(fqdn);
    if fqdn.is_empty() {
        debug!(%host, %ip, "Reverse lookup returned no names");
        return host.to_string();
    }

    let address = format!("{fqdn}:{port}");
    info!(%host, %address, "Resolved site address");
    address
}
