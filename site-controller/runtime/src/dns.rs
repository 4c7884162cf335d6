use hickory_resolver::{system_conf, TokioAsyncResolver};
use site_controller_core::{Resolve, ResolveError};
use std::{net::IpAddr, time::Duration};

/// Resolves site addresses with the system's DNS configuration.
#[derive(Clone)]
pub struct Resolver {
    resolver: TokioAsyncResolver,
}

impl Resolver {
    /// Builds a resolver from the system configuration, bounding each query by
    /// `timeout`.
    pub fn from_system_config(timeout: Duration) -> anyhow::Result<Self> {
        let (config, mut opts) = system_conf::read_system_conf()?;
        opts.timeout = timeout;
        // A stale answer is corrected by a later pass.
        opts.attempts = 1;
        let resolver = TokioAsyncResolver::tokio(config, opts);
        Ok(Self { resolver })
    }
}

#[async_trait::async_trait]
impl Resolve for Resolver {
    async fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>, ResolveError> {
        let lookup = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| ResolveError::new(host, e))?;
        Ok(lookup.iter().collect())
    }

    async fn lookup_addr(&self, ip: IpAddr) -> Result<Vec<String>, ResolveError> {
        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| ResolveError::new(ip, e))?;
        Ok(lookup.iter().map(|ptr| ptr.0.to_utf8()).collect())
    }
}
