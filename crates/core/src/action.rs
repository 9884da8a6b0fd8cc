// SPDX-License-Identifier: MIT

//! MasterAction: one user-initiated, multi-stage workflow run.

use crate::params::ParamMap;
use crate::ring_buffer::RingBuffer;
use crate::stage::Stage;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a MasterAction run (`ma-<uuid>`).
    pub struct MasterActionId("ma");
}

/// The kind of workflow a MasterAction runs. Handler resolution is keyed on
/// this; concrete handler business logic lives outside the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum OperationType {
    VerifyEnvironment,
    UpdatePackages,
    RunDiagnosticProbe,
}

crate::simple_display! {
    OperationType {
        VerifyEnvironment => "VerifyEnvironment",
        UpdatePackages => "UpdatePackages",
        RunDiagnosticProbe => "RunDiagnosticProbe",
    }
}

/// Overall status of a MasterAction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasterActionStatus {
    Pending,
    InProgress,
    Cancelling,
    Succeeded,
    SucceededWithErrors,
    Failed,
    Cancelled,
}

crate::simple_display! {
    MasterActionStatus {
        Pending => "Pending",
        InProgress => "InProgress",
        Cancelling => "Cancelling",
        Succeeded => "Succeeded",
        SucceededWithErrors => "SucceededWithErrors",
        Failed => "Failed",
        Cancelled => "Cancelled",
    }
}

impl MasterActionStatus {
    /// Terminal statuses: Succeeded, SucceededWithErrors, Failed, Cancelled.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MasterActionStatus::Succeeded
                | MasterActionStatus::SucceededWithErrors
                | MasterActionStatus::Failed
                | MasterActionStatus::Cancelled
        )
    }
}

/// A user-initiated, multi-stage workflow run.
///
/// Mutated only from the action's owning task plus the Dispatcher and
/// HealthMonitor via typed progress messages; once terminal no field other
/// than archival metadata may change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasterAction {
    pub id: MasterActionId,
    pub operation_type: OperationType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub initiator: String,
    pub parameters: ParamMap,
    pub start_time_epoch_ms: u64,
    pub end_time_epoch_ms: Option<u64>,
    pub status: MasterActionStatus,
    pub progress_percent: u8,
    pub recent_logs: RingBuffer<String>,
    pub result: Option<ParamMap>,
    pub stages: Vec<Stage>,
    pub active_stage_index: Option<usize>,
}

impl MasterAction {
    pub fn new(
        operation_type: OperationType,
        initiator: impl Into<String>,
        parameters: ParamMap,
        start_time_epoch_ms: u64,
    ) -> Self {
        Self {
            id: MasterActionId::new(),
            operation_type,
            name: None,
            description: None,
            initiator: initiator.into(),
            parameters,
            start_time_epoch_ms,
            end_time_epoch_ms: None,
            status: MasterActionStatus::Pending,
            progress_percent: 0,
            recent_logs: RingBuffer::new(200),
            result: None,
            stages: Vec::new(),
            active_stage_index: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Transition to a terminal status, stamping `end_time`.
    ///
    /// Invariant: `endTime` is set iff status is terminal.
    pub fn finish(&mut self, status: MasterActionStatus, now_epoch_ms: u64) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.end_time_epoch_ms = Some(now_epoch_ms);
    }

    pub fn active_stage(&self) -> Option<&Stage> {
        self.active_stage_index.and_then(|i| self.stages.get(i))
    }

    pub fn active_stage_mut(&mut self) -> Option<&mut Stage> {
        self.active_stage_index.and_then(move |i| self.stages.get_mut(i))
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        self.recent_logs.push(line.into());
    }
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
