// SPDX-License-Identifier: MIT

//! Master↔Slave wire message shapes (spec.md §6). Field names are
//! normative; the transport that actually carries these bytes is out of
//! scope — the core only ever calls [`crate::transport::AgentTransport`].

use fleet_core::{NodeActionId, NodeTaskId, NodeTaskStatus, TaskType};
use serde::{Deserialize, Serialize};

/// A message sent from the Master to a slave agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum MasterToSlave {
    PrepareForTask {
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        expected_task_type: TaskType,
        preparation_parameters_json: String,
        target_resource: Option<String>,
    },
    SlaveTask {
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        task_type: TaskType,
        parameters_json: Option<String>,
        timeout_seconds: u64,
    },
    CancelTask {
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        reason: String,
    },
    RequestLogFlushForTask {
        node_action_id: NodeActionId,
    },
    MasterStateUpdate {
        message: String,
    },
    AdjustSystemTime {
        epoch_ms: u64,
    },
    GeneralCommand {
        command: String,
        parameters_json: Option<String>,
    },
}

/// A message sent from a slave agent to the Master.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum SlaveToMaster {
    Heartbeat {
        node_name: String,
        timestamp_epoch_ms: u64,
        cpu_usage_percent: f32,
        ram_usage_percent: f32,
    },
    ReadinessReport {
        task_id: NodeTaskId,
        is_ready: bool,
        reason_if_not_ready: Option<String>,
    },
    TaskProgressUpdate {
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        status: NodeTaskStatus,
        progress_percent: Option<u8>,
        message: Option<String>,
        result_json: Option<String>,
        timestamp_epoch_ms: u64,
    },
    LogEntry {
        node_action_id: NodeActionId,
        task_id: Option<NodeTaskId>,
        node_name: String,
        timestamp_epoch_ms: u64,
        log_level: LogLevel,
        log_message: String,
    },
    DiagnosticsReport {
        node_name: String,
        timestamp_epoch_ms: u64,
        summary: String,
        report: serde_json::Value,
    },
}

/// Severity of a log line, shared by slave-originated and Master-originated
/// log entries so the Journal formats both identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

fleet_core::simple_display! {
    LogLevel {
        Trace => "TRACE",
        Debug => "DEBUG",
        Info => "INFO",
        Warn => "WARN",
        Error => "ERROR",
    }
}

/// A single log line destined for a stage's log directory, already
/// resolved to the node/task/action coordinates the Journal needs to
/// route it (spec.md §4.1 "stateless log routing").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    pub node_action_id: NodeActionId,
    pub task_id: Option<NodeTaskId>,
    pub node_name: String,
    pub timestamp_epoch_ms: u64,
    pub log_level: LogLevel,
    pub log_message: String,
}

impl LogRecord {
    /// Format matching the Journal's append format:
    /// `YYYY-MM-DD HH:MM:SS.fffZ [Level] Message\n` (spec.md §4.1).
    pub fn format_line(&self) -> String {
        format!("{} [{}] {}\n", format_timestamp(self.timestamp_epoch_ms), self.log_level, self.log_message)
    }
}

/// Render an epoch-millisecond timestamp as `YYYY-MM-DD HH:MM:SS.fffZ`
/// (spec.md §4.1's log-line format).
pub fn format_timestamp(epoch_ms: u64) -> String {
    let secs = (epoch_ms / 1000) as i64;
    let millis = (epoch_ms % 1000) as u32;
    let dt = chrono::DateTime::from_timestamp(secs, millis * 1_000_000).unwrap_or_default();
    dt.format("%Y-%m-%d %H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
