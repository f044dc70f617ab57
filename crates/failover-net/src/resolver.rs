//! System resolver
//!
//! Uses the operating system's resolver, so answers honour the host's
//! resolver configuration and caches.

use async_trait::async_trait;
use failover_core::model::{AdvertisedState, Family};
use failover_core::traits::Resolver;
use failover_core::{Error, Result};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

/// Default lookup timeout
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolver backed by the operating system
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// All addresses of `domain`, in resolver order
    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>> {
        let lookup = tokio::net::lookup_host((domain, 0));
        let addrs = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| {
                Error::resolution(format!(
                    "Lookup of {} timed out after {:?}",
                    domain, self.timeout
                ))
            })?
            .map_err(|e| Error::resolution(format!("Lookup of {} failed: {}", domain, e)))?;

        let addrs: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        debug!("{} resolves to {:?}", domain, addrs);
        Ok(addrs)
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLVE_TIMEOUT)
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve_family(&self, domain: &str, family: Family) -> Result<Option<IpAddr>> {
        let addrs = self.lookup(domain).await?;
        Ok(addrs.into_iter().find(|ip| family.matches(ip)))
    }

    /// One lookup serves both families
    async fn advertised(&self, domain: &str) -> Result<AdvertisedState> {
        let addrs = self.lookup(domain).await?;

        let mut state = AdvertisedState::default();
        for ip in addrs {
            match ip {
                IpAddr::V4(v4) if state.ipv4.is_none() => state.ipv4 = Some(v4),
                IpAddr::V6(v6) if state.ipv6.is_none() => state.ipv6 = Some(v6),
                _ => {}
            }
        }
        Ok(state)
    }
}
