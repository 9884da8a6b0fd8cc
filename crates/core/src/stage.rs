// SPDX-License-Identifier: MIT

//! Stage: one step of a MasterAction, and the node-name/stage-name
//! sanitizer shared by the Journal's on-disk layout.

use crate::params::ParamMap;
use crate::task::NodeTask;
use serde::{Deserialize, Serialize};

/// One step of a MasterAction.
///
/// Invariants: `index` is dense and monotonically increasing within its
/// MasterAction; the on-disk stage directory is named
/// `<index>-<sanitized-name>`; a Stage becomes terminal only when every
/// NodeTask is terminal (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub index: usize,
    pub name: String,
    pub start_time_epoch_ms: u64,
    pub end_time_epoch_ms: Option<u64>,
    pub input: Option<ParamMap>,
    pub result: Option<ParamMap>,
    pub success: bool,
    pub node_tasks: Vec<NodeTask>,
}

impl Stage {
    pub fn new(index: usize, name: impl Into<String>, input: Option<ParamMap>, start_time_epoch_ms: u64) -> Self {
        Self {
            index,
            name: name.into(),
            start_time_epoch_ms,
            end_time_epoch_ms: None,
            input,
            result: None,
            success: false,
            node_tasks: Vec::new(),
        }
    }

    /// Stage directory name on disk: `<index>-<sanitized-name>`.
    pub fn directory_name(&self) -> String {
        format!("{}-{}", self.index, sanitize_path_segment(&self.name))
    }

    /// All NodeTasks terminal ⇒ Stage terminal (invariant 3, spec.md §8).
    pub fn is_terminal(&self) -> bool {
        !self.node_tasks.is_empty() && self.node_tasks.iter().all(|t| t.is_terminal())
    }

    pub fn finish(&mut self, success: bool, result: Option<ParamMap>, now_epoch_ms: u64) {
        self.success = success;
        self.result = result;
        self.end_time_epoch_ms = Some(now_epoch_ms);
    }
}

/// Sanitize a user-supplied name for use as a filesystem path segment.
///
/// Replaces any character outside `[A-Za-z0-9._-]` with `_`, collapses the
/// empty result to `_`, and trims to a reasonable length so stage/node
/// names can never escape their parent directory or blow past typical
/// filename limits.
pub fn sanitize_path_segment(raw: &str) -> String {
    const MAX_LEN: usize = 128;
    let mut out: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() {
        out.push('_');
    }
    if out.len() > MAX_LEN {
        out.truncate(MAX_LEN);
    }
    out
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
