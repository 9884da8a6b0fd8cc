// SPDX-License-Identifier: MIT

use super::*;
use crate::action::MasterActionId;

#[test]
fn initiated_row_tags_event_type_with_suffix() {
    let info = InitiateChangeInfo {
        event_type: "AgentConnected".to_string(),
        source: ChangeSource::SystemEvent,
        initiator: "system".to_string(),
        description: "Agent 'node-a' connected".to_string(),
    };
    let row = SystemChangeRecord::initiated(ChangeId::new(), 1_700_000_000_000, &info);
    assert_eq!(row.event_type, "AgentConnectedInitiated");
    assert_eq!(row.source_master_action_id, "system-event");
    assert!(!row.is_finalized());
}

#[test]
fn master_action_source_uses_the_run_id() {
    let id = MasterActionId::from_string("ma-fixed");
    let source = ChangeSource::MasterAction(id.clone());
    assert_eq!(source.as_id_string(), id.to_string());
}

#[test]
fn finalized_row_has_outcome() {
    let info = InitiateChangeInfo {
        event_type: "PackageUpdate".to_string(),
        source: ChangeSource::SystemHealthMonitor,
        initiator: "health-monitor".to_string(),
        description: "probe".to_string(),
    };
    let mut row = SystemChangeRecord::initiated(ChangeId::new(), 0, &info);
    row.outcome = Some(ChangeOutcome::Success);
    assert!(row.is_finalized());
}
