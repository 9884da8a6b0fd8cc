// SPDX-License-Identifier: MIT

//! The Journal (C1): durable filesystem-backed Action Journal and Change
//! Journal, plus the stateless nodeAction→stage log-routing map (spec.md
//! §4.1).

use crate::error::JournalError;
use crate::layout::EnvironmentLayout;
use crate::locks::PathLocks;
use crate::records::{ActionIndexEntry, NodeTaskResultDoc, StageInfo, StageResultDoc};
use fleet_core::{
    ChangeId, ChangeOutcome, FinalizeChangeInfo, InitiateChangeInfo, MasterAction, MasterActionId, MasterActionStatus,
    NodeActionId, NodeTask, ParamMap, Stage, SystemChangeRecord,
};
use fleet_wire::LogRecord;
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// What a `ListChanges` query returns for one Change Journal entry: the
/// Initiated row merged with its Outcome row, if finalized.
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct ChangeSummary {
    pub change_id: ChangeId,
    pub event_type: String,
    pub source_master_action_id: String,
    pub initiator: String,
    pub description: String,
    pub initiated_at_epoch_ms: u64,
    pub finalized_at_epoch_ms: Option<u64>,
    pub outcome: Option<ChangeOutcome>,
    pub artifact_path: Option<String>,
}

impl ChangeSummary {
    pub fn is_finalized(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Filter for [`Journal::list_changes`].
#[derive(Debug, Clone, Default)]
pub struct ListChangesFilter {
    pub event_type_prefix: Option<String>,
    pub source_master_action_id: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

struct ActiveAction {
    dir: PathBuf,
}

/// Durable filesystem-backed Action Journal and Change Journal.
pub struct Journal {
    layout: EnvironmentLayout,
    locks: PathLocks,
    active_actions: Mutex<HashMap<MasterActionId, ActiveAction>>,
    node_action_to_stage: Mutex<HashMap<NodeActionId, PathBuf>>,
    action_to_node_actions: Mutex<HashMap<MasterActionId, HashSet<NodeActionId>>>,
}

impl Journal {
    pub fn new(root: impl Into<PathBuf>, environment_name: &str) -> Self {
        Self {
            layout: EnvironmentLayout::new(root, environment_name),
            locks: PathLocks::new(),
            active_actions: Mutex::new(HashMap::new()),
            node_action_to_stage: Mutex::new(HashMap::new()),
            action_to_node_actions: Mutex::new(HashMap::new()),
        }
    }

    pub fn layout(&self) -> &EnvironmentLayout {
        &self.layout
    }

    // ---- Action Journal -------------------------------------------------

    /// Create the action's on-disk tree and append the one-time index row
    /// (invariant 7, spec.md §8).
    pub async fn record_action_initiated(&self, action: &MasterAction) {
        let dir_name = EnvironmentLayout::action_dir_name(action.start_time_epoch_ms, action.id.as_str());
        let action_dir = self.layout.action_dir(&dir_name);

        if let Err(e) = ensure_dir(&action_dir).await {
            tracing::error!(action_id = %action.id, error = %e, "failed to create action directory");
            return;
        }
        let info_path = EnvironmentLayout::action_info_file(&action_dir);
        self.write_json(&info_path, action).await;

        let entry = ActionIndexEntry {
            action_id: action.id.clone(),
            created_epoch_ms: action.start_time_epoch_ms,
            action_dir_name: dir_name,
        };
        self.append_line(&self.layout.action_journal_index(), &entry).await;

        self.active_actions.lock().insert(action.id.clone(), ActiveAction { dir: action_dir });
    }

    /// Finalize the action's on-disk tree with its terminal state and
    /// release the in-memory `activeActions` entry.
    pub async fn record_action_completed(&self, action: &MasterAction) {
        let Some(dir) = self.active_action_dir(&action.id) else {
            tracing::warn!(action_id = %action.id, "record_action_completed for unknown action");
            return;
        };
        let info_path = EnvironmentLayout::action_info_file(&dir);
        self.write_json(&info_path, action).await;
        self.active_actions.lock().remove(&action.id);
    }

    /// Materialize a stage directory and its `stage_info.json`.
    pub async fn record_stage_initiated(&self, action_id: &MasterActionId, stage: &Stage) {
        let Some(action_dir) = self.active_action_dir(action_id) else {
            tracing::warn!(%action_id, "record_stage_initiated for unknown action");
            return;
        };
        let stage_dir = EnvironmentLayout::stage_dir(&action_dir, stage.index, &stage.name);
        if let Err(e) = ensure_dir(&EnvironmentLayout::stage_logs_dir(&stage_dir)).await {
            tracing::error!(%action_id, error = %e, "failed to create stage logs directory");
            return;
        }
        if let Err(e) = ensure_dir(&EnvironmentLayout::stage_results_dir(&stage_dir)).await {
            tracing::error!(%action_id, error = %e, "failed to create stage results directory");
            return;
        }
        let info_path = EnvironmentLayout::stage_info_file(&stage_dir);
        self.write_json(&info_path, &StageInfo::from(stage)).await;
    }

    pub async fn record_stage_completed(&self, action_id: &MasterActionId, stage: &Stage) {
        let Some(action_dir) = self.active_action_dir(action_id) else {
            tracing::warn!(%action_id, "record_stage_completed for unknown action");
            return;
        };
        let stage_dir = EnvironmentLayout::stage_dir(&action_dir, stage.index, &stage.name);
        let info_path = EnvironmentLayout::stage_info_file(&stage_dir);
        self.write_json(&info_path, &StageInfo::from(stage)).await;
        if let Some(result) = stage.result.clone() {
            let result_path = EnvironmentLayout::stage_result_file(&stage_dir);
            self.write_json(&result_path, &StageResultDoc { result }).await;
        }
    }

    /// Install the stateless route used for log/result arrivals. Both maps
    /// are updated atomically under one lock acquisition each (spec.md §4.1
    /// "key algorithm").
    pub fn map_node_action_to_stage(
        &self,
        action_id: &MasterActionId,
        stage_index: usize,
        stage_name: &str,
        node_action_id: &NodeActionId,
    ) {
        let Some(action_dir) = self.active_action_dir(action_id) else {
            tracing::warn!(%action_id, "map_node_action_to_stage for unknown action");
            return;
        };
        let stage_dir = EnvironmentLayout::stage_dir(&action_dir, stage_index, stage_name);
        self.node_action_to_stage.lock().insert(node_action_id.clone(), stage_dir);
        self.action_to_node_actions.lock().entry(action_id.clone()).or_default().insert(node_action_id.clone());
    }

    /// Idempotent: a no-op for an unknown action id (spec.md §8 Idempotence).
    pub fn clear_mappings(&self, action_id: &MasterActionId) {
        if let Some(node_actions) = self.action_to_node_actions.lock().remove(action_id) {
            let mut map = self.node_action_to_stage.lock();
            for node_action_id in node_actions {
                map.remove(&node_action_id);
            }
        }
    }

    /// Route a slave-originated log entry to the stage identified by
    /// `entry.node_action_id`. Unmapped entries are warned and dropped
    /// (spec.md §4.1).
    pub async fn append_slave_log_to_stage(&self, entry: &LogRecord) {
        let stage_dir = self.node_action_to_stage.lock().get(&entry.node_action_id).cloned();
        let Some(stage_dir) = stage_dir else {
            tracing::warn!(node_action_id = %entry.node_action_id.as_str(), "log entry for unmapped nodeAction dropped");
            return;
        };
        let log_path = EnvironmentLayout::node_log_file(&stage_dir, &entry.node_name);
        self.append_raw_line(&log_path, &entry.format_line()).await;
    }

    /// Route a Master-generated log line to an explicit stage directory.
    pub async fn append_master_log_to_stage(
        &self,
        action_id: &MasterActionId,
        stage_index: usize,
        stage_name: &str,
        line: &str,
    ) {
        let Some(action_dir) = self.active_action_dir(action_id) else {
            tracing::warn!(%action_id, "append_master_log_to_stage for unknown action");
            return;
        };
        let stage_dir = EnvironmentLayout::stage_dir(&action_dir, stage_index, stage_name);
        let log_path = EnvironmentLayout::master_log_file(&stage_dir);
        self.append_raw_line(&log_path, line).await;
    }

    pub async fn record_node_task_result(&self, action_id: &MasterActionId, stage_index: usize, stage_name: &str, task: &NodeTask) {
        let Some(action_dir) = self.active_action_dir(action_id) else {
            tracing::warn!(%action_id, "record_node_task_result for unknown action");
            return;
        };
        let stage_dir = EnvironmentLayout::stage_dir(&action_dir, stage_index, stage_name);
        let path = EnvironmentLayout::node_task_result_file(&stage_dir, &task.node_name, task.task_id.as_str());
        let doc = NodeTaskResultDoc {
            node_name: task.node_name.clone(),
            task_id: task.task_id.to_string(),
            status: task.status,
            result: task.result_payload.clone().unwrap_or_default(),
        };
        self.write_json(&path, &doc).await;
    }

    pub async fn record_master_action_result(&self, action_id: &MasterActionId, payload: &ParamMap) {
        let Some(action_dir) = self.active_action_dir(action_id) else {
            tracing::warn!(%action_id, "record_master_action_result for unknown action");
            return;
        };
        let path = action_dir.join("master_action_result.json");
        self.write_json(&path, payload).await;
    }

    pub fn active_action_dir(&self, action_id: &MasterActionId) -> Option<PathBuf> {
        self.active_actions.lock().get(action_id).map(|a| a.dir.clone())
    }

    /// Load an archived (terminal, no longer active) action from its
    /// on-disk tree by scanning the index for its directory name.
    pub async fn get_archived_action(&self, action_id: &MasterActionId) -> Option<MasterAction> {
        let entry = self.find_index_entry(action_id).await?;
        let action_dir = self.layout.action_dir(&entry.action_dir_name);
        let info_path = EnvironmentLayout::action_info_file(&action_dir);
        self.read_json(&info_path).await
    }

    /// Startup crash recovery (spec.md §1 Non-goals: "crash during a
    /// workflow marks it terminally failed on recovery"). Scans the Action
    /// Journal index for any action whose on-disk tree has no terminal
    /// status and rewrites it as `Failed`. Returns the recovered ids.
    ///
    /// Safe to call before any action is registered in `activeActions` —
    /// it reads and writes `master_action_info.json` directly by directory
    /// name rather than going through the active-action table.
    pub async fn recover_incomplete_actions(&self, now_epoch_ms: u64) -> Vec<MasterActionId> {
        let mut recovered = Vec::new();
        for line in self.read_lines(&self.layout.action_journal_index()).await {
            let Ok(entry) = serde_json::from_str::<ActionIndexEntry>(&line) else {
                continue;
            };
            let action_dir = self.layout.action_dir(&entry.action_dir_name);
            let info_path = EnvironmentLayout::action_info_file(&action_dir);
            let Some(mut action) = self.read_json::<MasterAction>(&info_path).await else {
                continue;
            };
            if action.status.is_terminal() {
                continue;
            }
            tracing::warn!(action_id = %action.id, "recovering incomplete action at startup, marking failed");
            action.push_log("recovered at daemon startup after an unclean shutdown; marked failed");
            action.finish(MasterActionStatus::Failed, now_epoch_ms);
            self.write_json(&info_path, &action).await;
            recovered.push(action.id.clone());
        }
        recovered
    }

    async fn find_index_entry(&self, action_id: &MasterActionId) -> Option<ActionIndexEntry> {
        let lines = self.read_lines(&self.layout.action_journal_index()).await;
        lines
            .into_iter()
            .filter_map(|line| serde_json::from_str::<ActionIndexEntry>(&line).ok())
            .find(|entry| &entry.action_id == action_id)
    }

    // ---- Change Journal ---------------------------------------------------

    /// Open a two-phase Change Journal entry, returning its id and an
    /// optional backup destination directory the caller may populate
    /// before calling [`Self::finalize_state_change`].
    pub async fn initiate_state_change(&self, created_epoch_ms: u64, info: &InitiateChangeInfo) -> (ChangeId, Option<PathBuf>) {
        let change_id = ChangeId::new();
        let row = SystemChangeRecord::initiated(change_id.clone(), created_epoch_ms, info);
        self.append_line(&self.layout.change_journal_index(), &row).await;

        let backup_dir = self.layout.backup_dir(created_epoch_ms, change_id.as_str());
        if let Err(e) = ensure_dir(&backup_dir).await {
            tracing::error!(%change_id, error = %e, "failed to create backup directory");
            return (change_id, None);
        }
        (change_id, Some(backup_dir))
    }

    /// Close a Change Journal entry. Duplicate finalization of the same
    /// change id is ignored with a warning (spec.md §8 Idempotence).
    pub async fn finalize_state_change(&self, finalized_epoch_ms: u64, info: &FinalizeChangeInfo) {
        let summaries = self.load_change_summaries().await;
        let Some(initiated) = summaries.iter().find(|s| s.change_id == info.change_id) else {
            tracing::warn!(change_id = %info.change_id, "finalize_state_change for unknown change id");
            return;
        };
        if initiated.is_finalized() {
            tracing::warn!(change_id = %info.change_id, "duplicate finalize_state_change ignored");
            return;
        }

        let row = SystemChangeRecord {
            timestamp_epoch_ms: finalized_epoch_ms,
            change_id: info.change_id.clone(),
            event_type: info.outcome.to_string(),
            source_master_action_id: initiated.source_master_action_id.clone(),
            initiator: initiated.initiator.clone(),
            description: info.description.clone().unwrap_or_else(|| initiated.description.clone()),
            outcome: Some(info.outcome),
            artifact_path: info.artifact_path.clone(),
        };
        self.append_line(&self.layout.change_journal_index(), &row).await;

        if let Some(artifact_path) = &info.artifact_path {
            let dest = self.layout.change_artifact_file(info.change_id.as_str());
            self.write_json(&dest, &serde_json::json!({ "artifact_path": artifact_path })).await;
        }
    }

    pub async fn list_changes(&self, filter: &ListChangesFilter) -> (Vec<ChangeSummary>, usize) {
        let mut summaries = self.load_change_summaries().await;
        summaries.sort_by_key(|s| std::cmp::Reverse(s.initiated_at_epoch_ms));

        if let Some(prefix) = &filter.event_type_prefix {
            summaries.retain(|s| s.event_type.starts_with(prefix.as_str()));
        }
        if let Some(source) = &filter.source_master_action_id {
            summaries.retain(|s| &s.source_master_action_id == source);
        }

        let total = summaries.len();
        let page: Vec<_> = summaries.into_iter().skip(filter.offset).take(filter.limit.unwrap_or(usize::MAX)).collect();
        (page, total)
    }

    pub async fn get_last_successful_change_of_type(&self, event_type: &str) -> Option<ChangeSummary> {
        let summaries = self.load_change_summaries().await;
        summaries
            .into_iter()
            .filter(|s| s.event_type == format!("{event_type}Initiated") && s.outcome == Some(ChangeOutcome::Success))
            .max_by_key(|s| s.finalized_at_epoch_ms.unwrap_or(0))
    }

    async fn load_change_summaries(&self) -> Vec<ChangeSummary> {
        let lines = self.read_lines(&self.layout.change_journal_index()).await;
        let mut by_id: HashMap<ChangeId, ChangeSummary> = HashMap::new();
        for line in lines {
            let Ok(row) = serde_json::from_str::<SystemChangeRecord>(&line) else { continue };
            match by_id.get_mut(&row.change_id) {
                None => {
                    by_id.insert(
                        row.change_id.clone(),
                        ChangeSummary {
                            change_id: row.change_id,
                            event_type: row.event_type,
                            source_master_action_id: row.source_master_action_id,
                            initiator: row.initiator,
                            description: row.description,
                            initiated_at_epoch_ms: row.timestamp_epoch_ms,
                            finalized_at_epoch_ms: None,
                            outcome: None,
                            artifact_path: None,
                        },
                    );
                }
                Some(existing) if row.outcome.is_some() => {
                    existing.finalized_at_epoch_ms = Some(row.timestamp_epoch_ms);
                    existing.outcome = row.outcome;
                    existing.artifact_path = row.artifact_path;
                    existing.description = row.description;
                }
                Some(_) => {}
            }
        }
        by_id.into_values().collect()
    }

    // ---- file primitives ----------------------------------------------

    async fn write_json<T: Serialize>(&self, path: &Path, value: &T) {
        if let Err(e) = self.try_write_json(path, value).await {
            tracing::error!(path = %path.display(), error = %e, "journal write failed, continuing in-memory");
        }
    }

    async fn try_write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), JournalError> {
        let lock = self.locks.lock_for(path);
        let _guard = lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| JournalError::io(parent.display().to_string(), e))?;
        }
        let json = serde_json::to_vec_pretty(value).map_err(|e| JournalError::json(path.display().to_string(), e))?;
        tokio::fs::write(path, json).await.map_err(|e| JournalError::io(path.display().to_string(), e))?;
        Ok(())
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Option<T> {
        let lock = self.locks.lock_for(path);
        let _guard = lock.lock().await;
        let bytes = tokio::fs::read(path).await.ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    async fn append_line<T: Serialize>(&self, path: &Path, value: &T) {
        let Ok(line) = serde_json::to_string(value) else {
            tracing::error!(path = %path.display(), "failed to serialize journal line");
            return;
        };
        self.append_raw_line(path, &format!("{line}\n")).await;
    }

    async fn append_raw_line(&self, path: &Path, line: &str) {
        if let Err(e) = self.try_append_raw_line(path, line).await {
            tracing::error!(path = %path.display(), error = %e, "journal append failed, continuing in-memory");
        }
    }

    async fn try_append_raw_line(&self, path: &Path, line: &str) -> Result<(), JournalError> {
        let lock = self.locks.lock_for(path);
        let _guard = lock.lock().await;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| JournalError::io(parent.display().to_string(), e))?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|e| JournalError::io(path.display().to_string(), e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| JournalError::io(path.display().to_string(), e))?;
        Ok(())
    }

    async fn read_lines(&self, path: &Path) -> Vec<String> {
        let lock = self.locks.lock_for(path);
        let _guard = lock.lock().await;
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents.lines().map(|l| l.to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(path).await
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
