// # Prober Trait
//
// Defines the interface for one bounded health check against one node.
//
// ## Implementations
//
// - HTTPS: `failover-net` crate (`HttpsProber`)

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

use crate::model::ProbeResult;

/// Trait for health probe implementations
///
/// A probe dials `target` directly, bypassing DNS, while presenting and
/// validating `tls_host` as the TLS server name. The result is infallible by
/// signature: timeouts, refused connections and handshake failures are all
/// reported as [`ProbeResult::failed`].
///
/// Implementations must not exceed `timeout` and must not retry.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe one node
    async fn probe(&self, target: IpAddr, tls_host: &str, timeout: Duration) -> ProbeResult;

    /// Get the prober name (for logging/debugging)
    fn prober_name(&self) -> &'static str {
        "prober"
    }
}
