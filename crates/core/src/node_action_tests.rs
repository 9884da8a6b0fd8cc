// SPDX-License-Identifier: MIT

use super::*;
use crate::task::{NodeTask, TaskType};

#[test]
fn task_lookup_by_id_finds_matching_task() {
    let task = NodeTask::new("node-a", TaskType::VerifyEnvironment, 30, 0);
    let task_id = task.task_id.clone();
    let mut action = NodeAction::new(0, "probe", vec![task]);

    assert!(action.task(task_id.as_str()).is_some());
    assert!(action.task_mut(task_id.as_str()).is_some());
    assert!(action.task("missing").is_none());
}

#[test]
fn new_id_carries_prefix() {
    let action = NodeAction::new(0, "probe", vec![]);
    assert!(action.id.as_str().starts_with("na-"));
}
