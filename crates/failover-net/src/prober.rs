//! HTTPS health prober
//!
//! The probe connects to the node's own address, yet sends the public host
//! as TLS server name and `Host` header. A node answering with a certificate
//! that is not valid for the public host is unhealthy.
//!
//! Exactly one request is sent per probe. Redirects are not followed, so a
//! 30x answer is unhealthy like any other non-200 status. Latency runs until
//! the response body has been read.

use async_trait::async_trait;
use failover_core::model::ProbeResult;
use failover_core::traits::Prober;
use failover_core::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use tracing::debug;

/// Default HTTPS port when the health URL does not carry one
const HTTPS_PORT: u16 = 443;

/// HTTPS prober for a fixed health URL
#[derive(Debug, Clone)]
pub struct HttpsProber {
    health_url: reqwest::Url,
}

impl HttpsProber {
    /// Create a prober for `health_url`
    ///
    /// The URL must be absolute, use HTTPS and name a host.
    pub fn new(health_url: &str) -> Result<Self> {
        let url = reqwest::Url::parse(health_url)
            .map_err(|e| Error::config(format!("Invalid health URL '{}': {}", health_url, e)))?;

        if url.scheme() != "https" {
            return Err(Error::config(format!(
                "Health URL must use HTTPS: {}",
                health_url
            )));
        }
        if url.host_str().is_none() {
            return Err(Error::config(format!("Health URL has no host: {}", health_url)));
        }

        Ok(Self { health_url: url })
    }

    pub fn health_url(&self) -> &str {
        self.health_url.as_str()
    }

    /// Health URL rewritten to `tls_host`, keeping path, query and port
    fn url_for(&self, tls_host: &str) -> Result<reqwest::Url> {
        let mut url = self.health_url.clone();
        url.set_host(Some(tls_host))
            .map_err(|e| Error::config(format!("Invalid TLS host '{}': {}", tls_host, e)))?;
        Ok(url)
    }

    /// A client whose only name resolution is `tls_host` → `target`
    fn client_for(
        &self,
        target: IpAddr,
        tls_host: &str,
        timeout: Duration,
    ) -> Result<reqwest::Client> {
        let port = self.health_url.port_or_known_default().unwrap_or(HTTPS_PORT);

        reqwest::Client::builder()
            .resolve(tls_host, SocketAddr::new(target, port))
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::http(format!("Failed to build probe client: {}", e)))
    }

    async fn try_probe(&self, target: IpAddr, tls_host: &str, timeout: Duration) -> Result<ProbeResult> {
        let url = self.url_for(tls_host)?;
        let client = self.client_for(target, tls_host, timeout)?;

        let started = Instant::now();
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("Request failed: {}", e)))?;
        let status = response.status();
        response
            .bytes()
            .await
            .map_err(|e| Error::http(format!("Reading response failed: {}", e)))?;
        let latency = started.elapsed();

        if status != reqwest::StatusCode::OK {
            debug!("Probe of {} answered {}", target, status);
            return Ok(ProbeResult::failed());
        }

        Ok(ProbeResult::healthy(latency))
    }
}

#[async_trait]
impl Prober for HttpsProber {
    async fn probe(&self, target: IpAddr, tls_host: &str, timeout: Duration) -> ProbeResult {
        match self.try_probe(target, tls_host, timeout).await {
            Ok(result) => result,
            Err(e) => {
                // Timeouts and refused connections are routine, keep them quiet
                debug!("Probe of {} ({}) failed: {}", target, tls_host, e);
                ProbeResult::failed()
            }
        }
    }

    fn prober_name(&self) -> &'static str {
        "https"
    }
}
