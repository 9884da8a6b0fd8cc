// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::NodeActionId;

#[test]
fn format_timestamp_matches_spec_shape() {
    // 2024-01-15T10:30:00.500Z
    let epoch_ms = 1_705_314_600_500;
    assert_eq!(format_timestamp(epoch_ms), "2024-01-15 10:30:00.500Z");
}

#[test]
fn log_record_line_ends_with_newline_and_has_level() {
    let record = LogRecord {
        node_action_id: NodeActionId::from_string("na-fixed"),
        task_id: None,
        node_name: "node-a".into(),
        timestamp_epoch_ms: 1_705_314_600_500,
        log_level: LogLevel::Info,
        log_message: "hello".into(),
    };
    let line = record.format_line();
    assert!(line.ends_with('\n'));
    assert!(line.contains("[INFO]"));
    assert!(line.contains("hello"));
}

#[test]
fn master_to_slave_round_trips_through_json() {
    let msg = MasterToSlave::CancelTask {
        node_action_id: NodeActionId::from_string("na-1"),
        task_id: fleet_core::NodeTaskId::from_string("task-1"),
        reason: "operator cancel".into(),
    };
    let json = serde_json::to_string(&msg).unwrap();
    let back: MasterToSlave = serde_json::from_str(&json).unwrap();
    assert_eq!(msg, back);
}

#[test]
fn slave_to_master_tags_variant_for_dispatch() {
    let json = serde_json::json!({
        "type": "Heartbeat",
        "node_name": "node-a",
        "timestamp_epoch_ms": 0,
        "cpu_usage_percent": 1.0,
        "ram_usage_percent": 2.0,
    });
    let msg: SlaveToMaster = serde_json::from_value(json).unwrap();
    assert!(matches!(msg, SlaveToMaster::Heartbeat { .. }));
}
