// SPDX-License-Identifier: MIT

//! HealthMonitor (C2): tracks per-node connectivity from heartbeats,
//! connect/disconnect events, and a periodic timeout sweep (spec.md §4.2).

use crate::error::HealthError;
use fleet_core::{ChangeSource, Clock, ConnectivityStatus, InitiateChangeInfo, NodeState};
use fleet_journal::Journal;
use fleet_wire::UiEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Agent connection metadata delivered by the AgentRegistry on connect.
#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub node_name: String,
    pub agent_version: String,
}

/// A heartbeat reported by a slave agent.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub node_name: String,
    pub timestamp_epoch_ms: u64,
    pub cpu_usage_percent: f32,
    pub ram_usage_percent: f32,
}

/// A diagnostics snapshot reported by a slave agent.
#[derive(Debug, Clone)]
pub struct DiagnosticsUpdate {
    pub node_name: String,
    pub timestamp_epoch_ms: u64,
    pub summary: String,
    pub report: serde_json::Value,
}

/// Derived thresholds, computed from the configured heartbeat interval
/// (spec.md §4.2's formulas) rather than configured independently.
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub heartbeat_interval_secs: u64,
    pub offline_after_secs: u64,
    pub unreachable_after_secs: u64,
    pub sweep_interval_secs: u64,
}

impl HealthThresholds {
    pub fn from_heartbeat_interval(heartbeat_interval_secs: u64) -> Self {
        Self {
            heartbeat_interval_secs,
            offline_after_secs: (3 * heartbeat_interval_secs).max(30),
            unreachable_after_secs: ((heartbeat_interval_secs * 3).div_ceil(2)).max(10),
            sweep_interval_secs: heartbeat_interval_secs.max(5),
        }
    }
}

pub struct HealthMonitor<C: Clock> {
    thresholds: HealthThresholds,
    clock: C,
    journal: Arc<Journal>,
    ui: Arc<dyn fleet_wire::UiNotifier>,
    nodes: Mutex<HashMap<String, NodeState>>,
}

impl<C: Clock> HealthMonitor<C> {
    pub fn new(thresholds: HealthThresholds, clock: C, journal: Arc<Journal>, ui: Arc<dyn fleet_wire::UiNotifier>) -> Self {
        Self { thresholds, clock, journal, ui, nodes: Mutex::new(HashMap::new()) }
    }

    pub fn thresholds(&self) -> HealthThresholds {
        self.thresholds
    }

    /// Read-only accessor for the Dispatcher's cancellation/health-watch logic.
    pub fn get_cached_state(&self, node_name: &str) -> Option<NodeState> {
        self.nodes.lock().get(node_name).cloned()
    }

    pub fn all_cached_states(&self) -> Vec<NodeState> {
        self.nodes.lock().values().cloned().collect()
    }

    pub async fn on_agent_connected(&self, info: AgentInfo) {
        let now = self.clock.epoch_ms();
        {
            let mut nodes = self.nodes.lock();
            let entry = nodes.entry(info.node_name.clone()).or_insert_with(|| NodeState::new(info.node_name.clone(), now));
            entry.status = ConnectivityStatus::Online;
            entry.agent_version = Some(info.agent_version);
            entry.last_state_update_epoch_ms = now;
        }
        self.journal_transition("AgentConnected", &format!("Agent '{}' connected", info.node_name), now).await;
        self.ui.publish(UiEvent::NodeStatusUpdate { node_name: info.node_name, status: ConnectivityStatus::Online }).await;
    }

    /// Idempotent: a repeat disconnect for an already-Offline node is a
    /// no-op transition (spec.md §8 Idempotence) but still notifies once.
    pub async fn on_agent_disconnected(&self, node_name: &str) {
        let now = self.clock.epoch_ms();
        let changed = {
            let mut nodes = self.nodes.lock();
            let entry = nodes.entry(node_name.to_string()).or_insert_with(|| NodeState::new(node_name, now));
            let changed = entry.status != ConnectivityStatus::Offline;
            entry.status = ConnectivityStatus::Offline;
            entry.last_state_update_epoch_ms = now;
            changed
        };
        if !changed {
            tracing::debug!(node_name, "duplicate on_agent_disconnected ignored");
            return;
        }
        self.journal_transition("AgentDisconnected", &format!("Agent '{node_name}' disconnected"), now).await;
        self.ui.publish(UiEvent::NodeStatusUpdate { node_name: node_name.to_string(), status: ConnectivityStatus::Offline }).await;
    }

    /// Record last-heartbeat time, CPU%, RAM%. Journals only on a
    /// transition away from non-Online; otherwise publishes a pure UI
    /// update so live gauges refresh without growing the audit log.
    pub async fn update_from_heartbeat(&self, hb: Heartbeat) {
        let now = self.clock.epoch_ms();
        let was_non_online = {
            let mut nodes = self.nodes.lock();
            let entry = nodes.entry(hb.node_name.clone()).or_insert_with(|| NodeState::new(hb.node_name.clone(), now));
            let was_non_online = entry.status != ConnectivityStatus::Online;
            entry.status = ConnectivityStatus::Online;
            entry.last_heartbeat_epoch_ms = Some(hb.timestamp_epoch_ms);
            entry.last_cpu_percent = Some(hb.cpu_usage_percent);
            entry.last_ram_percent = Some(hb.ram_usage_percent);
            entry.last_state_update_epoch_ms = now;
            was_non_online
        };

        if was_non_online {
            self.journal_transition("NodeReconnected", &format!("Node '{}' reconnected", hb.node_name), now).await;
        }
        self.ui.publish(UiEvent::NodeStatusUpdate { node_name: hb.node_name, status: ConnectivityStatus::Online }).await;
    }

    /// Update the cached health summary; journals only when the summary
    /// text actually changes.
    pub async fn update_diagnostics(&self, update: DiagnosticsUpdate) {
        let now = self.clock.epoch_ms();
        let changed = {
            let mut nodes = self.nodes.lock();
            let entry = nodes.entry(update.node_name.clone()).or_insert_with(|| NodeState::new(update.node_name.clone(), now));
            let changed = entry.last_health_summary.as_deref() != Some(update.summary.as_str());
            entry.last_health_summary = Some(update.summary.clone());
            entry.last_diagnostics_report = Some(update.report);
            entry.last_state_update_epoch_ms = now;
            changed
        };
        if changed {
            self.journal_transition("HealthSummaryChanged", &format!("Node '{}': {}", update.node_name, update.summary), now).await;
            self.ui.publish(UiEvent::HealthCheckIssueFound { node_name: update.node_name, summary: update.summary }).await;
        }
    }

    /// On-demand time-based re-classification for one node. Errors with
    /// [`HealthError::UnknownNode`] if the node has never connected or
    /// reported a heartbeat, distinguishing "nothing to reclassify" from
    /// "we've never heard of this node."
    pub async fn refresh_connectivity(&self, node_name: &str) -> Result<(), HealthError> {
        if !self.nodes.lock().contains_key(node_name) {
            return Err(HealthError::UnknownNode(node_name.to_string()));
        }
        let now = self.clock.epoch_ms();
        if let Some(transition) = self.reclassify_one(node_name, now) {
            self.journal_transition("NodeConnectivityChanged", &format!("Node '{node_name}': {transition}"), now).await;
            self.ui.publish(UiEvent::NodeStatusUpdate { node_name: node_name.to_string(), status: transition }).await;
        }
        Ok(())
    }

    /// Recompute one node's classification from the age of its last
    /// heartbeat (spec.md §4.2). Returns the new status if it changed.
    fn reclassify_one(&self, node_name: &str, now: u64) -> Option<ConnectivityStatus> {
        let mut nodes = self.nodes.lock();
        let entry = nodes.get_mut(node_name)?;
        if !matches!(entry.status, ConnectivityStatus::Online | ConnectivityStatus::Unreachable) {
            return None;
        }
        let Some(last_heartbeat) = entry.last_heartbeat_epoch_ms else {
            // No heartbeat ever seen: NeverConnected is preserved, else Unknown.
            let new_status =
                if entry.status == ConnectivityStatus::NeverConnected { ConnectivityStatus::NeverConnected } else { ConnectivityStatus::Unknown };
            if new_status == entry.status {
                return None;
            }
            entry.status = new_status;
            entry.last_state_update_epoch_ms = now;
            return Some(new_status);
        };
        let age_secs = now.saturating_sub(last_heartbeat) / 1000;
        let new_status = if age_secs > self.thresholds.offline_after_secs {
            ConnectivityStatus::Offline
        } else if age_secs > self.thresholds.unreachable_after_secs {
            ConnectivityStatus::Unreachable
        } else {
            ConnectivityStatus::Online
        };
        if new_status == entry.status {
            return None;
        }
        entry.status = new_status;
        entry.last_state_update_epoch_ms = now;
        Some(new_status)
    }

    /// One pass of the overdue sweep (spec.md §4.2): iterate all tracked
    /// nodes currently Online or Unreachable and reclassify by heartbeat age.
    pub async fn sweep_once(&self) {
        let now = self.clock.epoch_ms();
        let candidates: Vec<String> = self
            .nodes
            .lock()
            .iter()
            .filter(|(_, state)| matches!(state.status, ConnectivityStatus::Online | ConnectivityStatus::Unreachable))
            .map(|(name, _)| name.clone())
            .collect();

        for node_name in candidates {
            if let Some(new_status) = self.reclassify_one(&node_name, now) {
                self.journal_transition("NodeConnectivityChanged", &format!("Node '{node_name}': {new_status}"), now).await;
                self.ui.publish(UiEvent::NodeStatusUpdate { node_name, status: new_status }).await;
            }
        }
    }

    async fn journal_transition(&self, event_type: &str, description: &str, now: u64) {
        let info = InitiateChangeInfo {
            event_type: event_type.to_string(),
            source: ChangeSource::SystemHealthMonitor,
            initiator: "health-monitor".to_string(),
            description: description.to_string(),
        };
        let (change_id, _) = self.journal.initiate_state_change(now, &info).await;
        self.journal
            .finalize_state_change(
                now,
                &fleet_core::FinalizeChangeInfo { change_id, outcome: fleet_core::ChangeOutcome::Success, description: None, artifact_path: None },
            )
            .await;
    }
}

/// Spawn the background overdue-sweep task (spec.md §4.2). Every
/// `thresholds.sweep_interval_secs`, reclassify all tracked nodes.
/// Cancels cleanly when `token` is cancelled.
pub fn spawn_overdue_sweep<C: Clock>(monitor: Arc<HealthMonitor<C>>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
    let interval = Duration::from_secs(monitor.thresholds.sweep_interval_secs);
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(interval) => monitor.sweep_once().await,
            }
        }
    })
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
