// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors surfaced by the HealthMonitor's typed query paths (spec.md §7
/// "NodeFailure"). Transition recording itself never fails outward — only
/// these explicit lookups distinguish "never heard of this node" from "no
/// state change."
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("node '{0}' is not tracked by the health monitor")]
    UnknownNode(String),
}

/// Errors surfaced by the AgentRegistry's send primitives (spec.md §4.3
/// "a send that throws is recorded as a Change Journal Failure"). The
/// Change Journal row is still the durable record of the failure; this type
/// exists for callers that need to react to the failure directly rather
/// than read it back out of the journal.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("send to '{node}' failed: {source}")]
    SendFailed {
        node: String,
        #[source]
        source: fleet_wire::TransportError,
    },
}
