// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::FakeClock;
use fleet_wire::FakeUiNotifier;
use std::sync::Arc;
use tempfile::TempDir;

fn monitor() -> (TempDir, Arc<HealthMonitor<FakeClock>>, Arc<FakeUiNotifier>, FakeClock) {
    let dir = TempDir::new().unwrap();
    let journal = Arc::new(Journal::new(dir.path(), "default"));
    let ui = Arc::new(FakeUiNotifier::new());
    let clock = FakeClock::new();
    let thresholds = HealthThresholds::from_heartbeat_interval(10);
    let monitor = Arc::new(HealthMonitor::new(thresholds, clock.clone(), journal, ui.clone()));
    (dir, monitor, ui, clock)
}

#[test]
fn thresholds_apply_spec_formulas() {
    let t = HealthThresholds::from_heartbeat_interval(10);
    assert_eq!(t.offline_after_secs, 30);
    assert_eq!(t.unreachable_after_secs, 15);
    assert_eq!(t.sweep_interval_secs, 10);

    let t = HealthThresholds::from_heartbeat_interval(2);
    assert_eq!(t.offline_after_secs, 30);
    assert_eq!(t.unreachable_after_secs, 10);
    assert_eq!(t.sweep_interval_secs, 5);
}

#[tokio::test]
async fn connect_sets_online_and_notifies() {
    let (_dir, monitor, ui, _clock) = monitor();
    monitor.on_agent_connected(AgentInfo { node_name: "node-a".into(), agent_version: "1.0".into() }).await;
    assert_eq!(monitor.get_cached_state("node-a").unwrap().status, ConnectivityStatus::Online);
    assert_eq!(ui.events().len(), 1);
}

#[tokio::test]
async fn disconnect_sets_offline_once_and_is_idempotent() {
    let (_dir, monitor, ui, _clock) = monitor();
    monitor.on_agent_connected(AgentInfo { node_name: "node-a".into(), agent_version: "1.0".into() }).await;
    monitor.on_agent_disconnected("node-a").await;
    monitor.on_agent_disconnected("node-a").await;
    assert_eq!(monitor.get_cached_state("node-a").unwrap().status, ConnectivityStatus::Offline);
    // connect + one real disconnect notify; the duplicate is a no-op.
    assert_eq!(ui.events().len(), 2);
}

#[tokio::test]
async fn heartbeat_from_offline_journals_reconnect() {
    let (_dir, monitor, _ui, _clock) = monitor();
    monitor.on_agent_disconnected("node-a").await;
    monitor.update_from_heartbeat(Heartbeat { node_name: "node-a".into(), timestamp_epoch_ms: 0, cpu_usage_percent: 1.0, ram_usage_percent: 2.0 }).await;
    assert_eq!(monitor.get_cached_state("node-a").unwrap().status, ConnectivityStatus::Online);
}

#[tokio::test]
async fn diagnostics_update_journals_only_on_change() {
    let (_dir, monitor, _ui, _clock) = monitor();
    monitor
        .update_diagnostics(DiagnosticsUpdate { node_name: "node-a".into(), timestamp_epoch_ms: 0, summary: "ok".into(), report: serde_json::json!({}) })
        .await;
    let (changes, total) = monitor.journal.list_changes(&fleet_journal::ListChangesFilter::default()).await;
    assert_eq!(total, 1);
    drop(changes);

    monitor
        .update_diagnostics(DiagnosticsUpdate { node_name: "node-a".into(), timestamp_epoch_ms: 0, summary: "ok".into(), report: serde_json::json!({}) })
        .await;
    let (_, total) = monitor.journal.list_changes(&fleet_journal::ListChangesFilter::default()).await;
    assert_eq!(total, 1, "unchanged summary should not append a second change");
}

#[tokio::test]
async fn sweep_marks_stale_node_unreachable_then_offline() {
    let (_dir, monitor, _ui, clock) = monitor();
    monitor.update_from_heartbeat(Heartbeat { node_name: "node-a".into(), timestamp_epoch_ms: clock.epoch_ms(), cpu_usage_percent: 0.0, ram_usage_percent: 0.0 }).await;

    clock.advance(std::time::Duration::from_secs(16));
    monitor.sweep_once().await;
    assert_eq!(monitor.get_cached_state("node-a").unwrap().status, ConnectivityStatus::Unreachable);

    clock.advance(std::time::Duration::from_secs(20));
    monitor.sweep_once().await;
    assert_eq!(monitor.get_cached_state("node-a").unwrap().status, ConnectivityStatus::Offline);
}

#[tokio::test]
async fn never_connected_node_is_untouched_by_sweep() {
    let (_dir, monitor, _ui, _clock) = monitor();
    monitor.sweep_once().await;
    assert!(monitor.get_cached_state("node-a").is_none());
}

#[tokio::test]
async fn refresh_connectivity_on_unknown_node_is_an_error() {
    let (_dir, monitor, _ui, _clock) = monitor();
    let result = monitor.refresh_connectivity("node-a").await;
    assert_eq!(result, Err(HealthError::UnknownNode("node-a".to_string())));
}

#[tokio::test]
async fn refresh_connectivity_on_tracked_node_reclassifies() {
    let (_dir, monitor, _ui, clock) = monitor();
    monitor.update_from_heartbeat(Heartbeat { node_name: "node-a".into(), timestamp_epoch_ms: clock.epoch_ms(), cpu_usage_percent: 0.0, ram_usage_percent: 0.0 }).await;

    clock.advance(std::time::Duration::from_secs(16));
    monitor.refresh_connectivity("node-a").await.expect("node-a is tracked");
    assert_eq!(monitor.get_cached_state("node-a").unwrap().status, ConnectivityStatus::Unreachable);
}
