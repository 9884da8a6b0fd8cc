// SPDX-License-Identifier: MIT

//! HealthMonitor's per-node cache entry and connectivity classification.

use serde::{Deserialize, Serialize};

/// Connectivity classification for one node (spec.md §3, §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectivityStatus {
    Online,
    Unreachable,
    Offline,
    NeverConnected,
    Unknown,
}

crate::simple_display! {
    ConnectivityStatus {
        Online => "Online",
        Unreachable => "Unreachable",
        Offline => "Offline",
        NeverConnected => "NeverConnected",
        Unknown => "Unknown",
    }
}

impl ConnectivityStatus {
    /// Nodes the Dispatcher's cancellation/health-watch logic treats as
    /// "gone" — short-circuit cancellation, fail in-flight tasks.
    pub fn is_gone(&self) -> bool {
        matches!(self, ConnectivityStatus::Offline | ConnectivityStatus::Unreachable)
    }
}

impl Default for ConnectivityStatus {
    fn default() -> Self {
        ConnectivityStatus::NeverConnected
    }
}

/// HealthMonitor's cached view of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    pub node_name: String,
    pub status: ConnectivityStatus,
    pub last_heartbeat_epoch_ms: Option<u64>,
    pub agent_version: Option<String>,
    pub last_cpu_percent: Option<f32>,
    pub last_ram_percent: Option<f32>,
    pub last_health_summary: Option<String>,
    pub last_diagnostics_report: Option<serde_json::Value>,
    pub last_state_update_epoch_ms: u64,
}

impl NodeState {
    pub fn new(node_name: impl Into<String>, now_epoch_ms: u64) -> Self {
        Self {
            node_name: node_name.into(),
            status: ConnectivityStatus::NeverConnected,
            last_heartbeat_epoch_ms: None,
            agent_version: None,
            last_cpu_percent: None,
            last_ram_percent: None,
            last_health_summary: None,
            last_diagnostics_report: None,
            last_state_update_epoch_ms: now_epoch_ms,
        }
    }
}

#[cfg(test)]
#[path = "node_state_tests.rs"]
mod tests;
