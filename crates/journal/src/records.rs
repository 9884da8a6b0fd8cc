// SPDX-License-Identifier: MIT

//! On-disk record shapes that aren't already part of `fleet_core`.

use fleet_core::{MasterActionId, ParamMap, Stage};
use serde::{Deserialize, Serialize};

/// One line of `ActionJournal/action_journal_index.log`: written exactly
/// once, at admission (spec.md §8 invariant 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionIndexEntry {
    pub action_id: MasterActionId,
    pub created_epoch_ms: u64,
    pub action_dir_name: String,
}

/// `stages/<i>-<name>/stage_info.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInfo {
    pub index: usize,
    pub name: String,
    pub start_time_epoch_ms: u64,
    pub end_time_epoch_ms: Option<u64>,
    pub input: Option<ParamMap>,
    pub result: Option<ParamMap>,
    pub success: bool,
}

impl From<&Stage> for StageInfo {
    fn from(stage: &Stage) -> Self {
        Self {
            index: stage.index,
            name: stage.name.clone(),
            start_time_epoch_ms: stage.start_time_epoch_ms,
            end_time_epoch_ms: stage.end_time_epoch_ms,
            input: stage.input.clone(),
            result: stage.result.clone(),
            success: stage.success,
        }
    }
}

/// `results/stage_result.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResultDoc {
    pub result: ParamMap,
}

/// `results/<node>-<taskId>-taskresult.json` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeTaskResultDoc {
    pub node_name: String,
    pub task_id: String,
    pub status: fleet_core::NodeTaskStatus,
    pub result: ParamMap,
}
