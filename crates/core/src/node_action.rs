// SPDX-License-Identifier: MIT

//! NodeAction: the Dispatcher's view of a Stage — a bag of NodeTasks
//! sharing one id used to correlate slave messages back to live state,
//! independent of the (durable, sanitized) stage name.

use crate::task::NodeTask;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Correlates slave↔master messages for one stage execution,
    /// independent of the stage's durable name.
    pub struct NodeActionId("na");
}

/// A bag of NodeTasks dispatched together as one stage execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAction {
    pub id: NodeActionId,
    pub stage_index: usize,
    pub stage_name: String,
    pub tasks: Vec<NodeTask>,
}

impl NodeAction {
    pub fn new(stage_index: usize, stage_name: impl Into<String>, tasks: Vec<NodeTask>) -> Self {
        Self { id: NodeActionId::new(), stage_index, stage_name: stage_name.into(), tasks }
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut NodeTask> {
        self.tasks.iter_mut().find(|t| t.task_id.as_str() == task_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&NodeTask> {
        self.tasks.iter().find(|t| t.task_id.as_str() == task_id)
    }
}

#[cfg(test)]
#[path = "node_action_tests.rs"]
mod tests;
