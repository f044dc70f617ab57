//! Test doubles and common utilities for architecture contract tests
//!
//! This module provides minimal test doubles that verify architectural
//! constraints without touching the network.

#![allow(dead_code)]

use failover_core::config::{FailoverConfig, NodeConfig, RecordStoreConfig};
use failover_core::error::{Error, Result};
use failover_core::model::{Family, ProbeResult};
use failover_core::store::MemoryRecordStore;
use failover_core::traits::{Prober, Resolver};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOMAIN: &str = "example.com";
pub const HEALTH_URL: &str = "https://example.com/health";

pub const A_V4: &str = "10.0.0.11";
pub const A_V6: &str = "2001:db8::11";
pub const B_V4: &str = "10.0.0.12";
pub const B_V6: &str = "2001:db8::12";
pub const C_V4: &str = "10.0.0.13";

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid test address")
}

/// A prober answering from a script keyed by target address
///
/// Unscripted targets fail. The script can be changed between cycles.
pub struct ScriptedProber {
    script: Arc<Mutex<HashMap<IpAddr, ProbeResult>>>,
    /// Delay applied before answering every probe
    delay: Duration,
    /// Call counter for probe()
    probe_call_count: Arc<AtomicUsize>,
    /// TLS host names seen by probe()
    seen_hosts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(HashMap::new())),
            delay: Duration::ZERO,
            probe_call_count: Arc::new(AtomicUsize::new(0)),
            seen_hosts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delay every probe answer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Mark `target` healthy with `latency_ms`
    pub fn healthy(&self, target: &str, latency_ms: u64) {
        self.script.lock().unwrap().insert(
            ip(target),
            ProbeResult::healthy(Duration::from_millis(latency_ms)),
        );
    }

    /// Mark `target` unhealthy
    pub fn failing(&self, target: &str) {
        self.script
            .lock()
            .unwrap()
            .insert(ip(target), ProbeResult::failed());
    }

    /// Get the number of times probe() was called
    pub fn probe_call_count(&self) -> usize {
        self.probe_call_count.load(Ordering::SeqCst)
    }

    /// TLS host names the watcher asked for
    pub fn seen_hosts(&self) -> Vec<String> {
        self.seen_hosts.lock().unwrap().clone()
    }

    /// Create a new ScriptedProber that shares script and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            script: Arc::clone(&other.script),
            delay: other.delay,
            probe_call_count: Arc::clone(&other.probe_call_count),
            seen_hosts: Arc::clone(&other.seen_hosts),
        }
    }
}

#[async_trait::async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, target: IpAddr, tls_host: &str, _timeout: Duration) -> ProbeResult {
        self.probe_call_count.fetch_add(1, Ordering::SeqCst);
        self.seen_hosts.lock().unwrap().push(tls_host.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .get(&target)
            .copied()
            .unwrap_or_else(ProbeResult::failed)
    }

    fn prober_name(&self) -> &'static str {
        "scripted"
    }
}

/// A resolver reading the anchor records straight from a memory store
///
/// Models a resolver with no caching: a switch is visible on the next cycle.
pub struct StoreResolver {
    store: MemoryRecordStore,
    /// Call counter for resolve_family()
    resolve_call_count: Arc<AtomicUsize>,
}

impl StoreResolver {
    pub fn new(store: &MemoryRecordStore) -> Self {
        Self {
            store: store.clone(),
            resolve_call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn resolve_call_count(&self) -> usize {
        self.resolve_call_count.load(Ordering::SeqCst)
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            store: other.store.clone(),
            resolve_call_count: Arc::clone(&other.resolve_call_count),
        }
    }
}

#[async_trait::async_trait]
impl Resolver for StoreResolver {
    async fn resolve_family(&self, domain: &str, family: Family) -> Result<Option<IpAddr>> {
        self.resolve_call_count.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .store
            .contents(domain, family)
            .await
            .first()
            .and_then(|content| content.parse().ok()))
    }
}

/// A resolver that always fails
pub struct FailingResolver;

#[async_trait::async_trait]
impl Resolver for FailingResolver {
    async fn resolve_family(&self, domain: &str, _family: Family) -> Result<Option<IpAddr>> {
        Err(Error::resolution(format!("SERVFAIL for {}", domain)))
    }
}

/// Nodes a (dual stack), b (dual stack) and c (IPv4 only)
pub fn three_nodes() -> Vec<NodeConfig> {
    vec![
        NodeConfig::new("a", A_V4).with_ipv6(A_V6),
        NodeConfig::new("b", B_V4).with_ipv6(B_V6),
        NodeConfig::new("c", C_V4),
    ]
}

/// Helper to create a minimal FailoverConfig for testing
pub fn minimal_config(nodes: Vec<NodeConfig>) -> FailoverConfig {
    let mut config = FailoverConfig::new(DOMAIN, HEALTH_URL);
    config.nodes = nodes;
    config.interval_secs = 1;
    config.probe_timeout_secs = 1;
    config.watch.event_channel_capacity = 100;
    config.store = RecordStoreConfig::Cloudflare {
        api_token: Some("test-token".to_string()),
        email: None,
        api_key: None,
        zone_id: None,
    };
    config
}

/// A zone publishing node a on both families, modified long ago
pub async fn zone_on_node_a() -> MemoryRecordStore {
    let store = MemoryRecordStore::new(DOMAIN);
    store.seed(DOMAIN, Family::V4, A_V4).await;
    store.seed(DOMAIN, Family::V6, A_V6).await;
    store
}
