// SPDX-License-Identifier: MIT

//! NodeTask: work assigned to one node within a stage, and its status
//! state machine (spec.md §3, transitions enumerated in §4.4).

use crate::params::ParamMap;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Identifier for a NodeTask, unique within its NodeAction.
    pub struct NodeTaskId("task");
}

/// The kind of work a NodeTask performs on its node. Opaque to the core —
/// slave-side task executors interpret the type and `task_payload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TaskType {
    VerifyEnvironment,
    UpdatePackages,
    RunDiagnosticProbe,
}

crate::simple_display! {
    TaskType {
        VerifyEnvironment => "VerifyEnvironment",
        UpdatePackages => "UpdatePackages",
        RunDiagnosticProbe => "RunDiagnosticProbe",
    }
}

/// Status of a NodeTask. See spec.md §3 for the full domain and §4.4 for
/// the transitions between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeTaskStatus {
    // Pre-execution
    Pending,
    AwaitingReadiness,
    ReadinessCheckSent,
    ReadyToExecute,
    TaskDispatched,
    // Running
    Starting,
    InProgress,
    Retrying,
    // Cancellation
    Cancelling,
    // Terminal
    Succeeded,
    SucceededWithIssues,
    Failed,
    Cancelled,
    CancellationFailed,
    NotReadyForTask,
    ReadinessCheckTimedOut,
    DispatchFailedPrepare,
    TaskDispatchFailedExecute,
    TimedOut,
    NodeOfflineDuringTask,
    Unknown,
}

crate::simple_display! {
    NodeTaskStatus {
        Pending => "Pending",
        AwaitingReadiness => "AwaitingReadiness",
        ReadinessCheckSent => "ReadinessCheckSent",
        ReadyToExecute => "ReadyToExecute",
        TaskDispatched => "TaskDispatched",
        Starting => "Starting",
        InProgress => "InProgress",
        Retrying => "Retrying",
        Cancelling => "Cancelling",
        Succeeded => "Succeeded",
        SucceededWithIssues => "SucceededWithIssues",
        Failed => "Failed",
        Cancelled => "Cancelled",
        CancellationFailed => "CancellationFailed",
        NotReadyForTask => "NotReadyForTask",
        ReadinessCheckTimedOut => "ReadinessCheckTimedOut",
        DispatchFailedPrepare => "DispatchFailed_Prepare",
        TaskDispatchFailedExecute => "TaskDispatchFailed_Execute",
        TimedOut => "TimedOut",
        NodeOfflineDuringTask => "NodeOfflineDuringTask",
        Unknown => "Unknown",
    }
}

impl NodeTaskStatus {
    /// Terminal statuses never mutate once reached (invariant 2, spec.md §8).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NodeTaskStatus::Succeeded
                | NodeTaskStatus::SucceededWithIssues
                | NodeTaskStatus::Failed
                | NodeTaskStatus::Cancelled
                | NodeTaskStatus::CancellationFailed
                | NodeTaskStatus::NotReadyForTask
                | NodeTaskStatus::ReadinessCheckTimedOut
                | NodeTaskStatus::DispatchFailedPrepare
                | NodeTaskStatus::TaskDispatchFailedExecute
                | NodeTaskStatus::TimedOut
                | NodeTaskStatus::NodeOfflineDuringTask
                | NodeTaskStatus::Unknown
        )
    }

    /// Whether this terminal status counts as a partial success for stage
    /// aggregation (spec.md §4.4.4).
    pub fn is_succeeded_with_issues(&self) -> bool {
        matches!(self, NodeTaskStatus::SucceededWithIssues)
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, NodeTaskStatus::Succeeded)
    }

    pub fn is_cancelled_or_cancelling(&self) -> bool {
        matches!(self, NodeTaskStatus::Cancelled | NodeTaskStatus::Cancelling)
    }
}

/// Work assigned to one node within a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTask {
    pub task_id: NodeTaskId,
    pub node_name: String,
    pub task_type: TaskType,
    pub task_payload: ParamMap,
    pub target_resource: Option<String>,
    pub timeout_seconds: u64,
    pub status: NodeTaskStatus,
    pub status_message: Option<String>,
    pub progress_percent: u8,
    pub start_time_epoch_ms: Option<u64>,
    pub end_time_epoch_ms: Option<u64>,
    pub last_update_epoch_ms: u64,
    pub result_payload: Option<ParamMap>,
}

impl NodeTask {
    pub fn new(node_name: impl Into<String>, task_type: TaskType, timeout_seconds: u64, now_epoch_ms: u64) -> Self {
        Self {
            task_id: NodeTaskId::new(),
            node_name: node_name.into(),
            task_type,
            task_payload: ParamMap::new(),
            target_resource: None,
            timeout_seconds,
            status: NodeTaskStatus::Pending,
            status_message: None,
            progress_percent: 0,
            start_time_epoch_ms: None,
            end_time_epoch_ms: None,
            last_update_epoch_ms: now_epoch_ms,
            result_payload: None,
        }
    }

    /// Clamp and set progress, per invariant `progressPercent` in [0,100].
    pub fn set_progress(&mut self, percent: u8) {
        self.progress_percent = percent.min(100);
    }

    /// Transition to a terminal status. No-op (per invariant 2) if already terminal.
    ///
    /// Returns `true` if the transition was applied.
    pub fn finish(&mut self, status: NodeTaskStatus, message: Option<String>, now_epoch_ms: u64) -> bool {
        debug_assert!(status.is_terminal());
        if self.status.is_terminal() {
            return false;
        }
        self.status = status;
        if message.is_some() {
            self.status_message = message;
        }
        self.end_time_epoch_ms = Some(now_epoch_ms);
        self.last_update_epoch_ms = now_epoch_ms;
        if self.status.is_succeeded() || self.status == NodeTaskStatus::SucceededWithIssues {
            self.progress_percent = 100;
        }
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct NodeTaskBuilder => NodeTask {
        into {
            node_name: String = "node-a",
        }
        set {
            task_type: TaskType = TaskType::VerifyEnvironment,
            timeout_seconds: u64 = 30,
            status: NodeTaskStatus = NodeTaskStatus::Pending,
            progress_percent: u8 = 0,
            last_update_epoch_ms: u64 = 1_700_000_000_000,
        }
        option {
            status_message: String = None,
            target_resource: String = None,
            start_time_epoch_ms: u64 = None,
            end_time_epoch_ms: u64 = None,
        }
        computed {
            task_id: NodeTaskId = NodeTaskId::new(),
            task_payload: ParamMap = ParamMap::new(),
            result_payload: Option<ParamMap> = None,
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
