//! Data model shared by the prober, decision engine and synchronizer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use crate::error::{Error, Result};

/// Name of the anchor record (the bare domain)
pub const ANCHOR: &str = "@";

/// Address family of a DNS record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// IPv4 (A records)
    V4,
    /// IPv6 (AAAA records)
    V6,
}

impl Family {
    /// DNS record type for this family
    pub fn record_type(self) -> &'static str {
        match self {
            Family::V4 => "A",
            Family::V6 => "AAAA",
        }
    }

    /// Whether an address belongs to this family
    pub fn matches(self, ip: &IpAddr) -> bool {
        match self {
            Family::V4 => ip.is_ipv4(),
            Family::V6 => ip.is_ipv6(),
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Family::V4 => "IPv4",
            Family::V6 => "IPv6",
        })
    }
}

/// A candidate node that can serve the published domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Node identity
    pub name: String,
    /// Address probed and published in A records
    pub ipv4: Ipv4Addr,
    /// Address published in AAAA records while this node is active
    pub ipv6: Option<Ipv6Addr>,
}

impl Node {
    pub fn new(name: impl Into<String>, ipv4: Ipv4Addr, ipv6: Option<Ipv6Addr>) -> Self {
        Self {
            name: name.into(),
            ipv4,
            ipv6,
        }
    }
}

/// Outcome of one health probe against one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResult {
    pub healthy: bool,
    /// Meaningful only when `healthy`
    pub latency: Duration,
}

impl ProbeResult {
    pub fn healthy(latency: Duration) -> Self {
        Self {
            healthy: true,
            latency,
        }
    }

    pub fn failed() -> Self {
        Self {
            healthy: false,
            latency: Duration::ZERO,
        }
    }
}

/// Addresses currently published for the domain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvertisedState {
    pub ipv4: Option<Ipv4Addr>,
    pub ipv6: Option<Ipv6Addr>,
}

/// A record as held by the remote record store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneRecord {
    /// Store-specific record identifier
    pub id: String,
    /// Record content as echoed by the store
    pub content: String,
    /// Last modification time, drives the cooldown
    pub last_modified: DateTime<Utc>,
}

/// Relative record name within the zone (`@`, `www`, `*`, ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordName(String);

impl RecordName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("Record name cannot be empty"));
        }
        if name.ends_with('.') || name.contains(char::is_whitespace) {
            return Err(Error::invalid_input(format!(
                "Record name must be relative to the zone: '{}'",
                name
            )));
        }
        Ok(Self(name.to_string()))
    }

    /// The anchor record name
    pub fn anchor() -> Self {
        Self(ANCHOR.to_string())
    }

    pub fn is_anchor(&self) -> bool {
        self.0 == ANCHOR
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Fully qualified name under `domain`
    pub fn fqdn(&self, domain: &str) -> String {
        if self.is_anchor() {
            domain.to_string()
        } else {
            format!("{}.{}", self.0, domain)
        }
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The explicit set of record names reconciled together
///
/// Ordering is deterministic: the anchor first, then the remaining names
/// sorted lexicographically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSet {
    names: Vec<RecordName>,
}

impl RecordSet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = names
            .into_iter()
            .map(RecordName::new)
            .collect::<Result<Vec<_>>>()?;
        parsed.sort_by(|a, b| b.is_anchor().cmp(&a.is_anchor()).then_with(|| a.cmp(b)));
        parsed.dedup();

        if !parsed.first().is_some_and(RecordName::is_anchor) {
            return Err(Error::invalid_input(format!(
                "Record set must contain the anchor record '{}'",
                ANCHOR
            )));
        }

        Ok(Self { names: parsed })
    }

    /// A set holding only the anchor record
    pub fn anchor_only() -> Self {
        Self {
            names: vec![RecordName::anchor()],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecordName> {
        self.names.iter()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A requested change of one family's published address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Switch<T> {
    /// Node whose address becomes published
    pub node: String,
    pub target: T,
}

/// Output of the decision engine for one cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    /// Node whose IPv4 matches the advertised IPv4, healthy or not
    pub active_node: Option<String>,
    pub switch_ipv4: Option<Switch<Ipv4Addr>>,
    /// A `None` target removes the AAAA records
    pub switch_ipv6: Option<Switch<Option<Ipv6Addr>>>,
}

impl Decision {
    /// True when nothing needs to be written
    pub fn is_noop(&self) -> bool {
        self.switch_ipv4.is_none() && self.switch_ipv6.is_none()
    }
}
