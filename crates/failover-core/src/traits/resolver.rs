// # Resolver Trait
//
// Defines the interface for reading the domain's published addresses.
//
// ## Implementations
//
// - System resolver: `failover-net` crate (`SystemResolver`)

use async_trait::async_trait;
use std::net::IpAddr;

use crate::model::{AdvertisedState, Family};

/// Trait for resolver implementations
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve the first address of `family` published for `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(ip))`: first matching address
    /// - `Ok(None)`: resolution succeeded but no address of that family exists
    /// - `Err(Error)`: resolution failed; the caller must abort its cycle
    async fn resolve_family(
        &self,
        domain: &str,
        family: Family,
    ) -> Result<Option<IpAddr>, crate::Error>;

    /// Resolve both families into an [`AdvertisedState`]
    async fn advertised(&self, domain: &str) -> Result<AdvertisedState, crate::Error> {
        let ipv4 = match self.resolve_family(domain, Family::V4).await? {
            Some(IpAddr::V4(ip)) => Some(ip),
            _ => None,
        };
        let ipv6 = match self.resolve_family(domain, Family::V6).await? {
            Some(IpAddr::V6(ip)) => Some(ip),
            _ => None,
        };
        Ok(AdvertisedState { ipv4, ipv6 })
    }
}
