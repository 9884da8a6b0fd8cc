// SPDX-License-Identifier: MIT

use super::*;
use fleet_core::{FakeClock, MasterActionStatus, NodeTaskStatus, OperationType};
use fleet_engine::handler::fake::SingleStageHandler;
use fleet_wire::{FakeAgentTransport, FakeUiNotifier};

fn test_config(state_dir: &std::path::Path) -> Config {
    Config {
        state_dir: state_dir.to_path_buf(),
        environment_name: "env".to_string(),
        heartbeat_interval_secs: 10,
        log_filter: "info".to_string(),
        log_dir: None,
    }
}

#[tokio::test]
async fn bootstrap_wires_components_and_creates_state_dir() {
    let tempdir = tempfile::tempdir().unwrap();
    let state_dir = tempdir.path().join("nested/state");
    let config = test_config(&state_dir);

    let daemon = Daemon::bootstrap(
        &config,
        FakeClock::new(),
        Arc::new(FakeAgentTransport::new()),
        Arc::new(FakeUiNotifier::new()),
        HandlerRegistry::new(),
    )
    .await
    .unwrap();

    assert!(state_dir.exists());
    daemon.shutdown().await;
}

#[tokio::test]
async fn bootstrap_recovers_incomplete_actions_from_a_prior_run() {
    let tempdir = tempfile::tempdir().unwrap();
    let config = test_config(tempdir.path());

    {
        let journal = Journal::new(&config.state_dir, &config.environment_name);
        let action = fleet_core::MasterAction::new(OperationType::VerifyEnvironment, "test", fleet_core::ParamMap::new(), 1_700_000_000_000);
        journal.record_action_initiated(&action).await;
    }

    let daemon = Daemon::bootstrap(
        &config,
        FakeClock::new(),
        Arc::new(FakeAgentTransport::new()),
        Arc::new(FakeUiNotifier::new()),
        HandlerRegistry::new(),
    )
    .await
    .unwrap();

    let recovered = daemon.journal.recover_incomplete_actions(0).await;
    assert!(recovered.is_empty(), "second scan should be a no-op once bootstrap already recovered it");

    daemon.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn coordinator_runs_an_action_end_to_end_through_the_bootstrapped_daemon() {
    let tempdir = tempfile::tempdir().unwrap();
    let config = test_config(tempdir.path());
    let transport = Arc::new(FakeAgentTransport::new());

    let mut handlers = HandlerRegistry::new();
    handlers.register(
        OperationType::VerifyEnvironment,
        Arc::new(SingleStageHandler::new("verify", fleet_core::TaskType::VerifyEnvironment, vec!["node-a".to_string()])),
    );

    let daemon =
        Daemon::bootstrap(&config, FakeClock::new(), transport.clone(), Arc::new(FakeUiNotifier::new()), handlers).await.unwrap();

    transport.connect("node-a");
    daemon.registry.on_connect("conn-node-a".to_string(), "node-a", "1.0", None).await;

    let action = daemon
        .coordinator
        .initiate(
            fleet_engine::InitiateRequest {
                operation_type: OperationType::VerifyEnvironment,
                name: None,
                description: None,
                parameters: fleet_core::ParamMap::new(),
            },
            "test-user",
        )
        .await
        .unwrap();

    for _ in 0..200 {
        tokio::task::yield_now().await;
    }

    let (node_action_id, task_id) = transport
        .sent_messages()
        .into_iter()
        .find_map(|(_, msg)| match msg {
            fleet_wire::MasterToSlave::PrepareForTask { node_action_id, task_id, .. } => Some((node_action_id, task_id)),
            _ => None,
        })
        .expect("no PrepareForTask sent yet");

    daemon.dispatcher.handle_readiness_report(task_id.clone(), true, None).await;
    daemon
        .dispatcher
        .handle_task_progress(node_action_id.clone(), task_id, NodeTaskStatus::Succeeded, Some(100), None, Some("{}".into()), 0)
        .await;
    daemon.router.confirm_log_flush(&node_action_id, "node-a");

    for _ in 0..200 {
        tokio::task::yield_now().await;
    }

    let status = daemon.coordinator.get_status(&action.id).await.unwrap();
    assert_eq!(status.status, MasterActionStatus::Succeeded);
    daemon.shutdown().await;
}
