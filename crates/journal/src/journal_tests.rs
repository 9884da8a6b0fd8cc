// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::{ChangeSource, MasterAction, NodeTask, OperationType, TaskType};
use fleet_wire::{LogLevel, LogRecord};
use tempfile::TempDir;

fn journal() -> (TempDir, Journal) {
    let dir = TempDir::new().unwrap();
    let journal = Journal::new(dir.path(), "default");
    (dir, journal)
}

fn new_action() -> MasterAction {
    MasterAction::new(OperationType::VerifyEnvironment, "alice", ParamMap::new(), 1_700_000_000_000)
}

#[tokio::test]
async fn record_action_initiated_creates_dir_and_index_line() {
    let (dir, journal) = journal();
    let action = new_action();
    journal.record_action_initiated(&action).await;

    let index_path = journal.layout().action_journal_index();
    let contents = tokio::fs::read_to_string(&index_path).await.unwrap();
    assert_eq!(contents.lines().count(), 1);
    assert!(contents.contains(action.id.as_str()));

    let action_dir = journal.active_action_dir(&action.id).unwrap();
    assert!(action_dir.starts_with(dir.path().join("default").join("ActionJournal")));
    assert!(tokio::fs::metadata(EnvironmentLayout::action_info_file(&action_dir)).await.is_ok());
}

#[tokio::test]
async fn record_action_completed_overwrites_info_and_clears_active_entry() {
    let (_dir, journal) = journal();
    let mut action = new_action();
    journal.record_action_initiated(&action).await;

    action.finish(fleet_core::MasterActionStatus::Succeeded, 1_700_000_005_000);
    journal.record_action_completed(&action).await;

    assert!(journal.active_action_dir(&action.id).is_none());
    let archived = journal.get_archived_action(&action.id).await.unwrap();
    assert_eq!(archived.status, fleet_core::MasterActionStatus::Succeeded);
    assert_eq!(archived.id, action.id);
}

#[tokio::test]
async fn stage_lifecycle_creates_stage_tree() {
    let (_dir, journal) = journal();
    let action = new_action();
    journal.record_action_initiated(&action).await;

    let mut stage = Stage::new(0, "Verify Disk", None, 1_700_000_001_000);
    journal.record_stage_initiated(&action.id, &stage).await;

    let action_dir = journal.active_action_dir(&action.id).unwrap();
    let stage_dir = EnvironmentLayout::stage_dir(&action_dir, 0, "Verify Disk");
    assert!(tokio::fs::metadata(EnvironmentLayout::stage_logs_dir(&stage_dir)).await.is_ok());
    assert!(tokio::fs::metadata(EnvironmentLayout::stage_results_dir(&stage_dir)).await.is_ok());

    stage.finish(true, Some(ParamMap::new()), 1_700_000_002_000);
    journal.record_stage_completed(&action.id, &stage).await;
    assert!(tokio::fs::metadata(EnvironmentLayout::stage_result_file(&stage_dir)).await.is_ok());
}

#[tokio::test]
async fn slave_log_routes_to_mapped_stage_and_preserves_order() {
    let (_dir, journal) = journal();
    let action = new_action();
    journal.record_action_initiated(&action).await;
    let stage = Stage::new(0, "probe", None, 0);
    journal.record_stage_initiated(&action.id, &stage).await;

    let node_action_id = fleet_core::NodeActionId::new();
    journal.map_node_action_to_stage(&action.id, 0, "probe", &node_action_id);

    for i in 0..5 {
        let entry = LogRecord {
            node_action_id: node_action_id.clone(),
            task_id: None,
            node_name: "node-a".into(),
            timestamp_epoch_ms: i,
            log_level: LogLevel::Info,
            log_message: format!("line {i}"),
        };
        journal.append_slave_log_to_stage(&entry).await;
    }

    let action_dir = journal.active_action_dir(&action.id).unwrap();
    let stage_dir = EnvironmentLayout::stage_dir(&action_dir, 0, "probe");
    let log_path = EnvironmentLayout::node_log_file(&stage_dir, "node-a");
    let contents = tokio::fs::read_to_string(&log_path).await.unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 5);
    for (i, line) in lines.iter().enumerate() {
        assert!(line.contains(&format!("line {i}")));
    }
}

#[tokio::test]
async fn unmapped_log_is_dropped_without_panicking() {
    let (_dir, journal) = journal();
    let entry = LogRecord {
        node_action_id: fleet_core::NodeActionId::new(),
        task_id: None,
        node_name: "node-a".into(),
        timestamp_epoch_ms: 0,
        log_level: LogLevel::Warn,
        log_message: "orphaned".into(),
    };
    journal.append_slave_log_to_stage(&entry).await;
}

#[tokio::test]
async fn clear_mappings_is_idempotent_on_unknown_action() {
    let (_dir, journal) = journal();
    journal.clear_mappings(&fleet_core::MasterActionId::new());
}

#[tokio::test]
async fn log_after_clear_mappings_is_dropped() {
    let (_dir, journal) = journal();
    let action = new_action();
    journal.record_action_initiated(&action).await;
    let node_action_id = fleet_core::NodeActionId::new();
    journal.map_node_action_to_stage(&action.id, 0, "probe", &node_action_id);
    journal.clear_mappings(&action.id);

    let entry = LogRecord {
        node_action_id,
        task_id: None,
        node_name: "node-a".into(),
        timestamp_epoch_ms: 0,
        log_level: LogLevel::Info,
        log_message: "late".into(),
    };
    journal.append_slave_log_to_stage(&entry).await;
    let action_dir = journal.active_action_dir(&action.id).unwrap();
    let stage_dir = EnvironmentLayout::stage_dir(&action_dir, 0, "probe");
    assert!(tokio::fs::metadata(EnvironmentLayout::node_log_file(&stage_dir, "node-a")).await.is_err());
}

#[tokio::test]
async fn record_node_task_result_writes_taskresult_file() {
    let (_dir, journal) = journal();
    let action = new_action();
    journal.record_action_initiated(&action).await;
    let stage = Stage::new(0, "probe", None, 0);
    journal.record_stage_initiated(&action.id, &stage).await;

    let mut task = NodeTask::new("node-a", TaskType::VerifyEnvironment, 30, 0);
    task.finish(fleet_core::NodeTaskStatus::Succeeded, None, 10);

    journal.record_node_task_result(&action.id, 0, "probe", &task).await;

    let action_dir = journal.active_action_dir(&action.id).unwrap();
    let stage_dir = EnvironmentLayout::stage_dir(&action_dir, 0, "probe");
    let path = EnvironmentLayout::node_task_result_file(&stage_dir, "node-a", task.task_id.as_str());
    assert!(tokio::fs::metadata(&path).await.is_ok());
}

#[tokio::test]
async fn recover_incomplete_actions_marks_non_terminal_actions_failed() {
    let (_dir, journal) = journal();
    let in_flight = new_action();
    journal.record_action_initiated(&in_flight).await;

    let mut finished = new_action();
    journal.record_action_initiated(&finished).await;
    finished.finish(fleet_core::MasterActionStatus::Succeeded, 1_700_000_005_000);
    journal.record_action_completed(&finished).await;

    let recovered = journal.recover_incomplete_actions(1_700_000_010_000).await;
    assert_eq!(recovered, vec![in_flight.id.clone()]);

    let archived = journal.get_archived_action(&in_flight.id).await.unwrap();
    assert_eq!(archived.status, fleet_core::MasterActionStatus::Failed);
    assert_eq!(archived.end_time_epoch_ms, Some(1_700_000_010_000));

    // Calling it again is a no-op: the now-Failed action is terminal, and
    // the already-Succeeded action was never touched.
    let recovered_again = journal.recover_incomplete_actions(1_700_000_020_000).await;
    assert!(recovered_again.is_empty());
}

#[tokio::test]
async fn change_journal_round_trip_success() {
    let (_dir, journal) = journal();
    let action_id = MasterActionId::new();
    let info = InitiateChangeInfo {
        event_type: "PackageUpdate".into(),
        source: ChangeSource::MasterAction(action_id.clone()),
        initiator: "alice".into(),
        description: "updating packages".into(),
    };
    let (change_id, backup_dir) = journal.initiate_state_change(1_000, &info).await;
    assert!(backup_dir.is_some());

    let (changes, total) = journal.list_changes(&ListChangesFilter::default()).await;
    assert_eq!(total, 1);
    assert!(!changes[0].is_finalized());

    journal
        .finalize_state_change(
            2_000,
            &FinalizeChangeInfo { change_id: change_id.clone(), outcome: ChangeOutcome::Success, description: None, artifact_path: None },
        )
        .await;

    let (changes, total) = journal.list_changes(&ListChangesFilter::default()).await;
    assert_eq!(total, 1);
    assert!(changes[0].is_finalized());
    assert_eq!(changes[0].outcome, Some(ChangeOutcome::Success));
    assert_eq!(changes[0].source_master_action_id, action_id.to_string());
}

#[tokio::test]
async fn duplicate_finalize_is_ignored() {
    let (_dir, journal) = journal();
    let info = InitiateChangeInfo {
        event_type: "AgentConnected".into(),
        source: ChangeSource::SystemEvent,
        initiator: "system".into(),
        description: "agent connected".into(),
    };
    let (change_id, _) = journal.initiate_state_change(0, &info).await;
    let finalize = FinalizeChangeInfo { change_id: change_id.clone(), outcome: ChangeOutcome::Success, description: None, artifact_path: None };
    journal.finalize_state_change(1, &finalize).await;
    journal.finalize_state_change(2, &finalize).await;

    let contents = tokio::fs::read_to_string(&journal.layout().change_journal_index()).await.unwrap();
    assert_eq!(contents.lines().count(), 2, "duplicate finalize must not append a third line");
}

#[tokio::test]
async fn get_last_successful_change_of_type_ignores_failures() {
    let (_dir, journal) = journal();
    let info = InitiateChangeInfo {
        event_type: "PackageUpdate".into(),
        source: ChangeSource::SystemEvent,
        initiator: "system".into(),
        description: "d".into(),
    };
    let (failed_id, _) = journal.initiate_state_change(0, &info).await;
    journal
        .finalize_state_change(1, &FinalizeChangeInfo { change_id: failed_id, outcome: ChangeOutcome::Failure, description: None, artifact_path: None })
        .await;

    let (success_id, _) = journal.initiate_state_change(2, &info).await;
    journal
        .finalize_state_change(
            3,
            &FinalizeChangeInfo { change_id: success_id.clone(), outcome: ChangeOutcome::Success, description: None, artifact_path: None },
        )
        .await;

    let last = journal.get_last_successful_change_of_type("PackageUpdate").await.unwrap();
    assert_eq!(last.change_id, success_id);
}

#[tokio::test]
async fn finalize_for_unknown_change_id_is_a_warned_noop() {
    let (_dir, journal) = journal();
    journal
        .finalize_state_change(
            0,
            &FinalizeChangeInfo { change_id: ChangeId::new(), outcome: ChangeOutcome::Success, description: None, artifact_path: None },
        )
        .await;
    let (_, total) = journal.list_changes(&ListChangesFilter::default()).await;
    assert_eq!(total, 0);
}
