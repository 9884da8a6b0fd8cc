// SPDX-License-Identifier: MIT

//! Change Journal row: a paired Initiated/Outcome audit entry.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a Change Journal entry (`chg-<uuid>`).
    pub struct ChangeId("chg");
}

/// Outcome of a finalized state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOutcome {
    Success,
    Failure,
}

crate::simple_display! {
    ChangeOutcome {
        Success => "Success",
        Failure => "Failure",
    }
}

/// Who or what originated a change: a MasterAction run, or one of the two
/// synthetic system sources used for out-of-band events (agent connect /
/// disconnect, health-monitor reclassification).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSource {
    MasterAction(crate::action::MasterActionId),
    SystemEvent,
    SystemHealthMonitor,
}

impl ChangeSource {
    /// The `sourceMasterActionId` string used in persisted rows, matching
    /// the `system-event` / `system-health-monitor` sentinels.
    pub fn as_id_string(&self) -> String {
        match self {
            ChangeSource::MasterAction(id) => id.to_string(),
            ChangeSource::SystemEvent => "system-event".to_string(),
            ChangeSource::SystemHealthMonitor => "system-health-monitor".to_string(),
        }
    }
}

/// Parameters supplied when opening a Change Journal entry.
#[derive(Debug, Clone)]
pub struct InitiateChangeInfo {
    pub event_type: String,
    pub source: ChangeSource,
    pub initiator: String,
    pub description: String,
}

/// Parameters supplied when closing a Change Journal entry.
#[derive(Debug, Clone)]
pub struct FinalizeChangeInfo {
    pub change_id: ChangeId,
    pub outcome: ChangeOutcome,
    pub description: Option<String>,
    pub artifact_path: Option<String>,
}

/// One row of the append-only Change Journal index, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemChangeRecord {
    pub timestamp_epoch_ms: u64,
    pub change_id: ChangeId,
    /// `<Type>Initiated` on open, `<Outcome>` string on close.
    pub event_type: String,
    pub source_master_action_id: String,
    pub initiator: String,
    pub description: String,
    pub outcome: Option<ChangeOutcome>,
    pub artifact_path: Option<String>,
}

impl SystemChangeRecord {
    pub fn initiated(change_id: ChangeId, timestamp_epoch_ms: u64, info: &InitiateChangeInfo) -> Self {
        Self {
            timestamp_epoch_ms,
            change_id,
            event_type: format!("{}Initiated", info.event_type),
            source_master_action_id: info.source.as_id_string(),
            initiator: info.initiator.clone(),
            description: info.description.clone(),
            outcome: None,
            artifact_path: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }
}

#[cfg(test)]
#[path = "change_record_tests.rs"]
mod tests;
