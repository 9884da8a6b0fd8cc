// SPDX-License-Identifier: MIT

//! AgentRegistry (C3): tracks which node names are currently attached,
//! maps transport connection ids↔node names, exposes typed send
//! primitives, and journals lifecycle events (spec.md §4.3).

use crate::error::RegistryError;
use crate::health::{AgentInfo, HealthMonitor};
use fleet_core::{ChangeOutcome, ChangeSource, Clock, FinalizeChangeInfo, InitiateChangeInfo, NodeActionId, NodeTaskId};
use fleet_journal::Journal;
use fleet_wire::{AgentTransport, MasterToSlave};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
struct ConnectedAgent {
    connection_id: String,
    node_name: String,
    agent_version: String,
    remote_addr: Option<String>,
}

/// Tracks attached agents and fans inbound lifecycle events to the
/// HealthMonitor and Journal.
pub struct AgentRegistry<C: Clock> {
    clock: C,
    journal: Arc<Journal>,
    health: Arc<HealthMonitor<C>>,
    transport: Arc<dyn AgentTransport>,
    by_node: Mutex<HashMap<String, ConnectedAgent>>,
    by_connection: Mutex<HashMap<String, String>>,
}

impl<C: Clock> AgentRegistry<C> {
    pub fn new(clock: C, journal: Arc<Journal>, health: Arc<HealthMonitor<C>>, transport: Arc<dyn AgentTransport>) -> Self {
        Self { clock, journal, health, transport, by_node: Mutex::new(HashMap::new()), by_connection: Mutex::new(HashMap::new()) }
    }

    pub fn is_connected(&self, node_name: &str) -> bool {
        self.by_node.lock().contains_key(node_name)
    }

    pub fn node_for_connection(&self, connection_id: &str) -> Option<String> {
        self.by_connection.lock().get(connection_id).cloned()
    }

    /// A new transport connection identified itself as `node_name`.
    pub async fn on_connect(&self, connection_id: impl Into<String>, node_name: impl Into<String>, agent_version: impl Into<String>, remote_addr: Option<String>) {
        let connection_id = connection_id.into();
        let node_name = node_name.into();
        let agent_version = agent_version.into();

        self.by_node.lock().insert(
            node_name.clone(),
            ConnectedAgent { connection_id: connection_id.clone(), node_name: node_name.clone(), agent_version: agent_version.clone(), remote_addr },
        );
        self.by_connection.lock().insert(connection_id, node_name.clone());

        self.journal_lifecycle_event(&format!("Agent '{node_name}' connected"), "AgentConnected").await;
        self.health.on_agent_connected(AgentInfo { node_name, agent_version }).await;
    }

    /// Idempotent: disconnecting an already-unknown connection is a no-op
    /// (spec.md §8 Idempotence).
    pub async fn on_disconnect(&self, connection_id: &str) {
        let node_name = self.by_connection.lock().remove(connection_id);
        let Some(node_name) = node_name else {
            tracing::debug!(connection_id, "on_disconnect for unknown connection ignored");
            return;
        };
        self.by_node.lock().remove(&node_name);
        self.journal_lifecycle_event(&format!("Agent '{node_name}' disconnected"), "AgentDisconnected").await;
        self.health.on_agent_disconnected(&node_name).await;
    }

    async fn journal_lifecycle_event(&self, description: &str, event_type: &str) {
        let now = self.clock.epoch_ms();
        let info = InitiateChangeInfo { event_type: event_type.to_string(), source: ChangeSource::SystemEvent, initiator: "agent-registry".to_string(), description: description.to_string() };
        let (change_id, _) = self.journal.initiate_state_change(now, &info).await;
        self.journal.finalize_state_change(now, &FinalizeChangeInfo { change_id, outcome: ChangeOutcome::Success, description: None, artifact_path: None }).await;
    }

    /// Send to an unknown node is a logged no-op; a send that fails is
    /// recorded as a Change Journal Failure row with the error message and
    /// surfaced to the caller as a [`RegistryError`] (spec.md §4.3).
    async fn send(&self, node_name: &str, message: MasterToSlave) -> Result<(), RegistryError> {
        if !self.is_connected(node_name) {
            tracing::warn!(node_name, "send to unknown node dropped");
            return Ok(());
        }
        if let Err(e) = self.transport.send(node_name, message).await {
            let now = self.clock.epoch_ms();
            let info = InitiateChangeInfo {
                event_type: "AgentSendFailed".to_string(),
                source: ChangeSource::SystemEvent,
                initiator: "agent-registry".to_string(),
                description: format!("send to '{node_name}' failed"),
            };
            let (change_id, _) = self.journal.initiate_state_change(now, &info).await;
            self.journal
                .finalize_state_change(
                    now,
                    &FinalizeChangeInfo { change_id, outcome: ChangeOutcome::Failure, description: Some(e.to_string()), artifact_path: None },
                )
                .await;
            return Err(RegistryError::SendFailed { node: node_name.to_string(), source: e });
        }
        Ok(())
    }

    pub async fn send_prepare_for_task(
        &self,
        node_name: &str,
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        expected_task_type: fleet_core::TaskType,
        preparation_parameters_json: String,
        target_resource: Option<String>,
    ) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::PrepareForTask { node_action_id, task_id, expected_task_type, preparation_parameters_json, target_resource }).await
    }

    pub async fn send_slave_task(
        &self,
        node_name: &str,
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        task_type: fleet_core::TaskType,
        parameters_json: Option<String>,
        timeout_seconds: u64,
    ) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::SlaveTask { node_action_id, task_id, task_type, parameters_json, timeout_seconds }).await
    }

    pub async fn send_cancel_task(&self, node_name: &str, node_action_id: NodeActionId, task_id: NodeTaskId, reason: String) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::CancelTask { node_action_id, task_id, reason }).await
    }

    pub async fn send_log_flush_request(&self, node_name: &str, node_action_id: NodeActionId) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::RequestLogFlushForTask { node_action_id }).await
    }

    pub async fn send_master_state_update(&self, node_name: &str, message: String) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::MasterStateUpdate { message }).await
    }

    pub async fn send_time_sync(&self, node_name: &str, epoch_ms: u64) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::AdjustSystemTime { epoch_ms }).await
    }

    pub async fn send_general_command(&self, node_name: &str, command: String, parameters_json: Option<String>) -> Result<(), RegistryError> {
        self.send(node_name, MasterToSlave::GeneralCommand { command, parameters_json }).await
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
