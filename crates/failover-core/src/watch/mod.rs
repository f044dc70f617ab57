//! Watch loop
//!
//! The Watcher drives one full cycle per interval:
//!
//! ```text
//! ┌──────────┐   ┌─────────────┐   ┌──────────┐   ┌──────────────────┐
//! │ Resolver │──►│ Prober (×N) │──►│  decide  │──►│ Synchronizer     │
//! │ (A/AAAA) │   │ (parallel)  │   │  (pure)  │   │ (A, then AAAA)   │
//! └──────────┘   └─────────────┘   └──────────┘   └──────────────────┘
//! ```
//!
//! ## Cycle Rules
//!
//! 1. A resolution failure aborts the cycle before any probe or write
//! 2. Every probe is awaited (or timed out) before deciding
//! 3. Each family is reconciled independently; a failure in one does not
//!    skip the other
//! 4. Errors are logged and reported, never fatal to the loop
//!
//! Cycles never overlap: a cycle that overruns the interval delays the
//! next tick.

use futures::future::join_all;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::FailoverConfig;
use crate::decision::decide;
use crate::error::Result;
use crate::model::{AdvertisedState, Decision, Family, Node, ProbeResult, RecordSet};
use crate::sync::{RecordSynchronizer, SyncOutcome, describe_target};
use crate::traits::{Prober, RecordStore, Resolver};

/// Events emitted by the Watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// Watch loop started
    Started { nodes_count: usize },

    /// A cycle ran to completion
    CycleCompleted {
        active_node: Option<String>,
        healthy_count: usize,
    },

    /// A family was reconciled towards a node
    Switched {
        family: Family,
        node: String,
        target: Option<IpAddr>,
        outcome: SyncOutcome,
    },

    /// Reconciling a family failed; the next cycle tries again
    SyncFailed {
        family: Family,
        error: String,
        guard: bool,
    },

    /// A cycle was aborted before deciding
    CycleFailed { error: String },

    /// Watch loop stopped
    Stopped { reason: String },
}

/// Everything one cycle observed and did
#[derive(Debug)]
pub struct CycleReport {
    pub advertised: AdvertisedState,
    /// One result per configured node, in node order
    pub results: Vec<ProbeResult>,
    pub decision: Decision,
    /// `None` when no IPv4 switch was decided
    pub ipv4: Option<Result<SyncOutcome>>,
    /// `None` when no IPv6 switch was decided
    pub ipv6: Option<Result<SyncOutcome>>,
}

/// Failover watch loop
///
/// ## Lifecycle
///
/// 1. Create with [`Watcher::new()`]
/// 2. Start with [`Watcher::run()`] or drive single cycles with [`Watcher::run_cycle()`]
/// 3. The loop runs until a shutdown signal is received
pub struct Watcher {
    resolver: Box<dyn Resolver>,
    prober: Box<dyn Prober>,
    synchronizer: RecordSynchronizer,
    nodes: Vec<Node>,
    records: RecordSet,
    domain: String,
    tls_host: String,
    probe_timeout: Duration,
    interval: Duration,
    event_tx: mpsc::Sender<WatchEvent>,
}

impl Watcher {
    /// Create a new watcher
    ///
    /// # Returns
    ///
    /// A tuple of (watcher, event_receiver) where event_receiver yields watch events
    pub fn new(
        resolver: Box<dyn Resolver>,
        prober: Box<dyn Prober>,
        store: Arc<dyn RecordStore>,
        config: FailoverConfig,
    ) -> Result<(Self, mpsc::Receiver<WatchEvent>)> {
        config.validate_watch()?;

        let (tx, rx) = mpsc::channel(config.watch.event_channel_capacity);

        let synchronizer = RecordSynchronizer::new(store, config.domain.clone())
            .with_zone_id(config.store.zone_id().map(str::to_string))
            .with_cooldown(config.sync.cooldown());

        let watcher = Self {
            resolver,
            prober,
            synchronizer,
            nodes: config.parsed_nodes()?,
            records: config.record_set()?,
            tls_host: config.tls_host()?,
            probe_timeout: config.probe_timeout(),
            interval: config.interval(),
            domain: config.domain,
            event_tx: tx,
        };

        Ok((watcher, rx))
    }

    /// Run the watch loop until Ctrl-C
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the watch loop until `shutdown_rx` fires (or its sender is dropped)
    ///
    /// Without a receiver this behaves like [`Watcher::run()`].
    pub async fn run_with_shutdown(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.emit_event(WatchEvent::Started {
            nodes_count: self.nodes.len(),
        });
        info!(
            "Watching {} with {} node(s) every {:?}",
            self.domain,
            self.nodes.len(),
            self.interval
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        error!("Watch cycle aborted: {}", e);
                        // Continue running despite errors
                    }
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(WatchEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run one resolve → probe → decide → reconcile cycle
    ///
    /// Fails only when the cycle could not reach a decision (resolution
    /// failure, malformed batch). Reconciliation failures are logged and
    /// returned inside the report.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let advertised = match self.resolver.advertised(&self.domain).await {
            Ok(advertised) => advertised,
            Err(e) => {
                self.emit_event(WatchEvent::CycleFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };
        debug!("Advertised state: {:?}", advertised);

        let results = self.probe_all().await;
        info!("{}", self.status_line(&advertised, &results));

        let decision = match decide(&advertised, &self.nodes, &results) {
            Ok(decision) => decision,
            Err(e) => {
                self.emit_event(WatchEvent::CycleFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        let ipv4 = match decision.switch_ipv4 {
            Some(ref switch) => Some(
                self.apply(
                    Family::V4,
                    &switch.node,
                    advertised.ipv4.map(IpAddr::V4),
                    Some(IpAddr::V4(switch.target)),
                )
                .await,
            ),
            None => None,
        };

        let ipv6 = match decision.switch_ipv6 {
            Some(ref switch) => Some(
                self.apply(Family::V6, &switch.node, None, switch.target.map(IpAddr::V6))
                    .await,
            ),
            None => None,
        };

        self.emit_event(WatchEvent::CycleCompleted {
            active_node: decision.active_node.clone(),
            healthy_count: results.iter().filter(|r| r.healthy).count(),
        });

        Ok(CycleReport {
            advertised,
            results,
            decision,
            ipv4,
            ipv6,
        })
    }

    /// Probe every node concurrently and wait for the whole batch
    async fn probe_all(&self) -> Vec<ProbeResult> {
        let probes = self.nodes.iter().map(|node| async move {
            let target = IpAddr::V4(node.ipv4);
            let probe = self.prober.probe(target, &self.tls_host, self.probe_timeout);
            match tokio::time::timeout(self.probe_timeout, probe).await {
                Ok(result) => result,
                Err(_) => {
                    debug!("Probe of {} ({}) timed out", node.name, target);
                    ProbeResult::failed()
                }
            }
        });
        join_all(probes).await
    }

    async fn apply(
        &self,
        family: Family,
        node: &str,
        source: Option<IpAddr>,
        target: Option<IpAddr>,
    ) -> Result<SyncOutcome> {
        info!("Switch {} to {} ({})", family, node, describe_target(target));

        let result = self
            .synchronizer
            .reconcile(&self.records, family, source, target)
            .await;

        match result {
            Ok(outcome) => {
                self.emit_event(WatchEvent::Switched {
                    family,
                    node: node.to_string(),
                    target,
                    outcome,
                });
            }
            Err(ref e) => {
                if e.is_guard() {
                    warn!("{} switch skipped: {}", family, e);
                } else {
                    error!("{} switch failed: {}", family, e);
                }
                self.emit_event(WatchEvent::SyncFailed {
                    family,
                    error: e.to_string(),
                    guard: e.is_guard(),
                });
            }
        }

        result
    }

    /// One line per cycle: `a (10.0.0.11) 42ms, b 30ms, c Fail`
    fn status_line(&self, advertised: &AdvertisedState, results: &[ProbeResult]) -> String {
        self.nodes
            .iter()
            .zip(results)
            .map(|(node, result)| {
                let mut entry = node.name.clone();
                if advertised.ipv4 == Some(node.ipv4) {
                    match node.ipv6.filter(|ip| advertised.ipv6 == Some(*ip)) {
                        Some(ipv6) => entry.push_str(&format!(" ({}, {})", node.ipv4, ipv6)),
                        None => entry.push_str(&format!(" ({})", node.ipv4)),
                    }
                }
                if result.healthy {
                    entry.push_str(&format!(" {}ms", result.latency.as_millis()));
                } else {
                    entry.push_str(" Fail");
                }
                entry
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Emit a watch event
    fn emit_event(&self, event: WatchEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
