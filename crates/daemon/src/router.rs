// SPDX-License-Identifier: MIT

//! Inbound message fan-out (spec.md §4.3: the AgentRegistry "fans inbound
//! messages to the Coordinator/Dispatcher/HealthMonitor"). Lives at the
//! daemon layer rather than on `AgentRegistry` itself: the Dispatcher
//! already holds an `Arc<AgentRegistry<C>>`, so routing the other
//! direction through the registry would be circular. A concrete transport
//! (out of scope per spec.md §1) decodes wire frames and calls
//! [`InboundRouter::route`] for each one.

use fleet_agents::{DiagnosticsUpdate, Heartbeat, HealthMonitor};
use fleet_core::{Clock, NodeActionId};
use fleet_engine::NodeActionDispatcher;
use fleet_wire::SlaveToMaster;
use std::sync::Arc;

/// Dispatches one decoded [`SlaveToMaster`] message to whichever component
/// owns that event (spec.md §4.3).
pub struct InboundRouter<C: Clock> {
    dispatcher: Arc<NodeActionDispatcher<C>>,
    health: Arc<HealthMonitor<C>>,
}

impl<C: Clock> InboundRouter<C> {
    pub fn new(dispatcher: Arc<NodeActionDispatcher<C>>, health: Arc<HealthMonitor<C>>) -> Self {
        Self { dispatcher, health }
    }

    pub async fn route(&self, message: SlaveToMaster) {
        match message {
            SlaveToMaster::Heartbeat { node_name, timestamp_epoch_ms, cpu_usage_percent, ram_usage_percent } => {
                self.health.update_from_heartbeat(Heartbeat { node_name, timestamp_epoch_ms, cpu_usage_percent, ram_usage_percent }).await;
            }
            SlaveToMaster::ReadinessReport { task_id, is_ready, reason_if_not_ready } => {
                self.dispatcher.handle_readiness_report(task_id, is_ready, reason_if_not_ready).await;
            }
            SlaveToMaster::TaskProgressUpdate { node_action_id, task_id, status, progress_percent, message, result_json, timestamp_epoch_ms } => {
                self.dispatcher
                    .handle_task_progress(node_action_id, task_id, status, progress_percent, message, result_json, timestamp_epoch_ms)
                    .await;
            }
            SlaveToMaster::LogEntry { node_action_id, task_id, node_name, timestamp_epoch_ms, log_level, log_message } => {
                self.dispatcher.handle_log_entry(fleet_wire::LogRecord { node_action_id, task_id, node_name, timestamp_epoch_ms, log_level, log_message });
            }
            SlaveToMaster::DiagnosticsReport { node_name, timestamp_epoch_ms, summary, report } => {
                self.health.update_diagnostics(DiagnosticsUpdate { node_name, timestamp_epoch_ms, summary, report }).await;
            }
        }
    }

    /// A concrete transport's own acknowledgment mechanism for
    /// `RequestLogFlushForTask` (spec.md §6 lists no explicit wire reply for
    /// this; the transport's ack is out of scope per spec.md §1) resolves
    /// to this call.
    pub fn confirm_log_flush(&self, node_action_id: &NodeActionId, node_name: &str) {
        self.dispatcher.handle_log_flush_confirmed(node_action_id, node_name);
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
