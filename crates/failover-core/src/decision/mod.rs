//! Failover decision engine
//!
//! Turns one batch of probe results into at most one switch per family.
//! The engine never touches the network: it is a pure function of the
//! advertised state, the node list and the probe results.
//!
//! ## Rules
//!
//! 1. The **active node** is the node whose IPv4 equals the advertised IPv4.
//! 2. A healthy active node keeps IPv4. Its IPv6 becomes the required AAAA
//!    target, so a mismatch yields an IPv6-only switch.
//! 3. A missing or unhealthy active node is replaced by the fastest healthy
//!    other node (first in input order on a tie). Both families follow it;
//!    an empty IPv6 on the promoted node means "remove AAAA".
//! 4. With no healthy candidate nothing is switched: staying on a broken node
//!    is preferred over guessing.

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{AdvertisedState, Decision, Node, ProbeResult, Switch};

/// Compute the switch intents for one cycle
///
/// `results[i]` must be the probe result of `nodes[i]`; a batch of a
/// different length is rejected rather than decided on partially.
pub fn decide(
    advertised: &AdvertisedState,
    nodes: &[Node],
    results: &[ProbeResult],
) -> Result<Decision> {
    if nodes.len() != results.len() {
        return Err(Error::invalid_input(format!(
            "Probe batch mismatch: {} node(s), {} result(s)",
            nodes.len(),
            results.len()
        )));
    }

    let active = nodes
        .iter()
        .position(|node| advertised.ipv4 == Some(node.ipv4));

    let mut decision = Decision {
        active_node: active.map(|i| nodes[i].name.clone()),
        ..Decision::default()
    };

    if let Some(i) = active.filter(|&i| results[i].healthy) {
        let node = &nodes[i];
        debug!("Active node {} is healthy", node.name);
        if node.ipv6 != advertised.ipv6 {
            decision.switch_ipv6 = Some(Switch {
                node: node.name.clone(),
                target: node.ipv6,
            });
        }
        return Ok(decision);
    }

    let fastest = nodes
        .iter()
        .zip(results)
        .enumerate()
        .filter(|(i, (_, result))| Some(*i) != active && result.healthy)
        .min_by_key(|(_, (_, result))| result.latency)
        .map(|(_, (node, _))| node);

    let Some(node) = fastest else {
        warn!(
            "No healthy node available, staying on {}",
            decision.active_node.as_deref().unwrap_or("<none>")
        );
        return Ok(decision);
    };

    decision.switch_ipv4 = Some(Switch {
        node: node.name.clone(),
        target: node.ipv4,
    });
    if node.ipv6 != advertised.ipv6 {
        decision.switch_ipv6 = Some(Switch {
            node: node.name.clone(),
            target: node.ipv6,
        });
    }

    Ok(decision)
}
