// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn new_node_state_starts_never_connected() {
    let state = NodeState::new("node-a", 0);
    assert_eq!(state.status, ConnectivityStatus::NeverConnected);
    assert!(state.last_heartbeat_epoch_ms.is_none());
}

#[test]
fn gone_statuses_match_spec() {
    assert!(ConnectivityStatus::Offline.is_gone());
    assert!(ConnectivityStatus::Unreachable.is_gone());
    assert!(!ConnectivityStatus::Online.is_gone());
    assert!(!ConnectivityStatus::NeverConnected.is_gone());
    assert!(!ConnectivityStatus::Unknown.is_gone());
}
