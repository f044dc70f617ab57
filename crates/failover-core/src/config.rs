//! Configuration types for the failover controller
//!
//! This module defines all configuration structures used throughout the crate.
//! Loading them (environment, files) is the embedding application's job;
//! [`FailoverConfig::validate`] turns them into the typed shapes the core runs on.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::model::{ANCHOR, Node, RecordSet};

/// Main failover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// Published domain (zone apex), e.g. "example.com"
    pub domain: String,

    /// Health-check URL fetched from every node, e.g. "https://example.com/health"
    pub health_url: String,

    /// TLS server name presented while probing (defaults to the health URL host)
    #[serde(default)]
    pub tls_host: Option<String>,

    /// Seconds between watch cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Per-probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Relative record names switched together; must include "@"
    #[serde(default = "default_records")]
    pub records: Vec<String>,

    /// Candidate nodes, in preference order for latency ties
    pub nodes: Vec<NodeConfig>,

    /// Record store configuration
    pub store: RecordStoreConfig,

    /// Synchronizer settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Watch loop settings
    #[serde(default)]
    pub watch: WatchConfig,
}

impl FailoverConfig {
    /// Create a configuration with defaults and no nodes
    pub fn new(domain: impl Into<String>, health_url: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            health_url: health_url.into(),
            tls_host: None,
            interval_secs: default_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            records: default_records(),
            nodes: Vec::new(),
            store: RecordStoreConfig::default(),
            sync: SyncConfig::default(),
            watch: WatchConfig::default(),
        }
    }

    /// Add a node
    pub fn with_node(mut self, node: NodeConfig) -> Self {
        self.nodes.push(node);
        self
    }

    /// Validate the configuration, record store credentials included
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.validate_watch()?;
        self.store.validate()
    }

    /// Validate everything the watch loop needs, leaving the record store
    /// settings to whoever builds the store
    pub fn validate_watch(&self) -> Result<(), crate::Error> {
        if self.domain.trim().is_empty() {
            return Err(crate::Error::config("Domain cannot be empty"));
        }
        if !self.health_url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Health URL must use HTTPS: {}",
                self.health_url
            )));
        }
        self.tls_host()?;
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Interval must be > 0"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        if self.watch.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.record_set()?;
        self.parsed_nodes()?;

        Ok(())
    }

    /// Host presented as TLS server name during probes
    pub fn tls_host(&self) -> Result<String, crate::Error> {
        if let Some(ref host) = self.tls_host {
            if host.trim().is_empty() {
                return Err(crate::Error::config("TLS host cannot be empty"));
            }
            return Ok(host.trim().to_string());
        }
        let url = url::Url::parse(&self.health_url).map_err(|e| {
            crate::Error::config(format!("Invalid health URL '{}': {}", self.health_url, e))
        })?;
        url.host_str()
            .filter(|host| !host.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                crate::Error::config(format!("Health URL has no host: {}", self.health_url))
            })
    }

    /// Record names as a deterministic set
    pub fn record_set(&self) -> Result<RecordSet, crate::Error> {
        RecordSet::new(self.records.iter().map(String::as_str))
            .map_err(|e| crate::Error::config(e.to_string()))
    }

    /// Nodes parsed into typed addresses
    pub fn parsed_nodes(&self) -> Result<Vec<Node>, crate::Error> {
        if self.nodes.is_empty() {
            return Err(crate::Error::config("No nodes configured"));
        }

        let mut names = HashSet::new();
        let mut addresses = HashSet::new();
        let mut nodes = Vec::with_capacity(self.nodes.len());

        for node in &self.nodes {
            let parsed = node.parse()?;
            if !names.insert(parsed.name.clone()) {
                return Err(crate::Error::config(format!(
                    "Duplicate node name: {}",
                    parsed.name
                )));
            }
            if !addresses.insert(parsed.ipv4) {
                return Err(crate::Error::config(format!(
                    "Duplicate node IPv4 address: {}",
                    parsed.ipv4
                )));
            }
            nodes.push(parsed);
        }

        Ok(nodes)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

/// Candidate node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name (identity)
    pub name: String,

    /// IPv4 address probed and published in A records
    pub ipv4: String,

    /// Optional IPv6 address published in AAAA records
    #[serde(default)]
    pub ipv6: Option<String>,
}

impl NodeConfig {
    /// Create a new node configuration
    pub fn new(name: impl Into<String>, ipv4: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ipv4: ipv4.into(),
            ipv6: None,
        }
    }

    /// Set the IPv6 address
    pub fn with_ipv6(mut self, ipv6: impl Into<String>) -> Self {
        self.ipv6 = Some(ipv6.into());
        self
    }

    /// Parse into a typed [`Node`]
    pub fn parse(&self) -> Result<Node, crate::Error> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(crate::Error::config("Node name cannot be empty"));
        }

        let ipv4: Ipv4Addr = self.ipv4.trim().parse().map_err(|_| {
            crate::Error::config(format!("Node {}: invalid IPv4 '{}'", name, self.ipv4))
        })?;

        let ipv6 = match self.ipv6.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<Ipv6Addr>().map_err(|_| {
                crate::Error::config(format!("Node {}: invalid IPv6 '{}'", name, raw))
            })?),
        };

        Ok(Node::new(name, ipv4, ipv6))
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordStoreConfig {
    /// Cloudflare record store
    Cloudflare {
        /// Cloudflare API token (preferred)
        #[serde(default)]
        api_token: Option<String>,
        /// Account email for global API key authentication
        #[serde(default)]
        email: Option<String>,
        /// Global API key
        #[serde(default)]
        api_key: Option<String>,
        /// Zone ID (optional, looked up from the domain otherwise)
        #[serde(default)]
        zone_id: Option<String>,
    },

    /// Custom record store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl RecordStoreConfig {
    /// Validate the record store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            RecordStoreConfig::Cloudflare {
                api_token,
                email,
                api_key,
                ..
            } => {
                let has_token = api_token.as_deref().is_some_and(|t| !t.is_empty());
                let has_key = email.as_deref().is_some_and(|e| !e.is_empty())
                    && api_key.as_deref().is_some_and(|k| !k.is_empty());
                if !has_token && !has_key {
                    return Err(crate::Error::config(
                        "Cloudflare requires an API token or an email and API key",
                    ));
                }
                Ok(())
            }
            RecordStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom record store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom record store config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the record store type name
    pub fn type_name(&self) -> &str {
        match self {
            RecordStoreConfig::Cloudflare { .. } => "cloudflare",
            RecordStoreConfig::Custom { factory, .. } => factory,
        }
    }

    /// Pre-configured zone id, if any
    pub fn zone_id(&self) -> Option<&str> {
        match self {
            RecordStoreConfig::Cloudflare { zone_id, .. } => zone_id.as_deref(),
            RecordStoreConfig::Custom { .. } => None,
        }
    }
}

impl Default for RecordStoreConfig {
    fn default() -> Self {
        RecordStoreConfig::Cloudflare {
            api_token: None,
            email: None,
            api_key: None,
            zone_id: None,
        }
    }
}

/// Synchronizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Minimum age of the anchor record before it may be switched again (seconds)
    ///
    /// This caps the switching rate regardless of how often the watch loop runs.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl SyncConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

/// Watch loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Capacity of the event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    60
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_records() -> Vec<String> {
    vec![ANCHOR.to_string()]
}

fn default_cooldown_secs() -> u64 {
    600
}

fn default_event_channel_capacity() -> usize {
    1000
}
