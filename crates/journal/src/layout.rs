// SPDX-License-Identifier: MIT

//! On-disk layout helpers (spec.md §4.1), relative to
//! `<root>/<environmentName>/`.

use chrono::{DateTime, Utc};
use fleet_core::sanitize_path_segment;
use std::path::{Path, PathBuf};

/// `<yyyyMMddHHmmssfff>` prefix used for action and backup directory names.
pub fn timestamp_prefix(epoch_ms: u64) -> String {
    let secs = (epoch_ms / 1000) as i64;
    let millis = (epoch_ms % 1000) as u32;
    let dt: DateTime<Utc> = DateTime::from_timestamp(secs, millis * 1_000_000).unwrap_or_default();
    dt.format("%Y%m%d%H%M%S%3f").to_string()
}

/// Layout root for one environment: `<root>/<environmentName>/`.
#[derive(Debug, Clone)]
pub struct EnvironmentLayout {
    root: PathBuf,
}

impl EnvironmentLayout {
    pub fn new(root: impl Into<PathBuf>, environment_name: &str) -> Self {
        Self { root: root.into().join(environment_name) }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn action_journal_dir(&self) -> PathBuf {
        self.root.join("ActionJournal")
    }

    pub fn action_journal_index(&self) -> PathBuf {
        self.action_journal_dir().join("action_journal_index.log")
    }

    pub fn action_dir(&self, action_dir_name: &str) -> PathBuf {
        self.action_journal_dir().join(action_dir_name)
    }

    /// `<yyyyMMddHHmmssfff>-<actionId>` directory name for one action.
    pub fn action_dir_name(created_epoch_ms: u64, action_id: &str) -> String {
        format!("{}-{}", timestamp_prefix(created_epoch_ms), action_id)
    }

    pub fn action_info_file(action_dir: &Path) -> PathBuf {
        action_dir.join("master_action_info.json")
    }

    pub fn stages_dir(action_dir: &Path) -> PathBuf {
        action_dir.join("stages")
    }

    pub fn stage_dir(action_dir: &Path, stage_index: usize, stage_name: &str) -> PathBuf {
        Self::stages_dir(action_dir).join(format!("{}-{}", stage_index, sanitize_path_segment(stage_name)))
    }

    pub fn stage_info_file(stage_dir: &Path) -> PathBuf {
        stage_dir.join("stage_info.json")
    }

    pub fn stage_logs_dir(stage_dir: &Path) -> PathBuf {
        stage_dir.join("logs")
    }

    pub fn node_log_file(stage_dir: &Path, node_name: &str) -> PathBuf {
        Self::stage_logs_dir(stage_dir).join(format!("{}.log", sanitize_path_segment(node_name)))
    }

    pub fn master_log_file(stage_dir: &Path) -> PathBuf {
        Self::stage_logs_dir(stage_dir).join("_master.log")
    }

    pub fn stage_results_dir(stage_dir: &Path) -> PathBuf {
        stage_dir.join("results")
    }

    pub fn stage_result_file(stage_dir: &Path) -> PathBuf {
        Self::stage_results_dir(stage_dir).join("stage_result.json")
    }

    pub fn node_task_result_file(stage_dir: &Path, node_name: &str, task_id: &str) -> PathBuf {
        Self::stage_results_dir(stage_dir)
            .join(format!("{}-{}-taskresult.json", sanitize_path_segment(node_name), sanitize_path_segment(task_id)))
    }

    pub fn change_journal_dir(&self) -> PathBuf {
        self.root.join("ChangeJournal")
    }

    pub fn change_journal_index(&self) -> PathBuf {
        self.change_journal_dir().join("system_changes_index.log")
    }

    pub fn change_artifact_file(&self, change_id: &str) -> PathBuf {
        self.change_journal_dir().join("artifacts").join(change_id).join("result_artifact.json")
    }

    pub fn backup_repository_dir(&self) -> PathBuf {
        self.root.join("BackupRepository")
    }

    /// `<yyyyMMddHHmmssfff>-backup-<changeId>` directory for a state change's backup artifact.
    pub fn backup_dir(&self, created_epoch_ms: u64, change_id: &str) -> PathBuf {
        self.backup_repository_dir().join(format!("{}-backup-{}", timestamp_prefix(created_epoch_ms), change_id))
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
