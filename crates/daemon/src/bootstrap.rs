// SPDX-License-Identifier: MIT

//! Wires the six components (Journal, HealthMonitor, AgentRegistry,
//! NodeActionDispatcher, MasterActionCoordinator, LogForwarder) into one
//! running daemon (SPEC_FULL §4 "Daemon lifecycle"), performs the startup
//! crash-recovery scan, and spawns the background overdue-connectivity
//! sweep.

use crate::config::Config;
use crate::error::DaemonError;
use crate::router::InboundRouter;
use fleet_agents::{spawn_overdue_sweep, AgentRegistry, HealthMonitor, HealthThresholds};
use fleet_core::Clock;
use fleet_engine::{HandlerRegistry, LogForwarder, MasterActionCoordinator, NodeActionDispatcher};
use fleet_journal::Journal;
use fleet_wire::{AgentTransport, UiNotifier};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The assembled daemon: every component plus the background tasks it owns.
pub struct Daemon<C: Clock> {
    pub journal: Arc<Journal>,
    pub health: Arc<HealthMonitor<C>>,
    pub registry: Arc<AgentRegistry<C>>,
    pub dispatcher: Arc<NodeActionDispatcher<C>>,
    pub coordinator: Arc<MasterActionCoordinator<C>>,
    pub log_forwarder: Arc<LogForwarder<C>>,
    pub router: Arc<InboundRouter<C>>,
    shutdown: CancellationToken,
    sweep_task: tokio::task::JoinHandle<()>,
}

impl<C: Clock> Daemon<C> {
    /// Assembles the daemon and runs the startup crash-recovery scan
    /// (spec.md §1 Non-goals: actions left in-flight by an unclean shutdown
    /// are marked `Failed`). Does not spawn any network listener: a concrete
    /// transport is wired in by the caller, out of scope here (spec.md §1).
    #[allow(clippy::too_many_arguments)]
    pub async fn bootstrap(
        config: &Config,
        clock: C,
        transport: Arc<dyn AgentTransport>,
        ui: Arc<dyn UiNotifier>,
        handlers: HandlerRegistry<C>,
    ) -> Result<Self, DaemonError> {
        std::fs::create_dir_all(&config.state_dir)
            .map_err(|source| DaemonError::StateDir { path: config.state_dir.display().to_string(), source })?;

        let journal = Arc::new(Journal::new(&config.state_dir, &config.environment_name));

        let recovered = journal.recover_incomplete_actions(clock.epoch_ms()).await;
        for action_id in &recovered {
            tracing::warn!(action_id = %action_id, "marked incomplete action failed during startup recovery");
        }

        let thresholds = HealthThresholds::from_heartbeat_interval(config.heartbeat_interval_secs);
        let health = Arc::new(HealthMonitor::new(thresholds, clock.clone(), journal.clone(), ui.clone()));
        let registry = Arc::new(AgentRegistry::new(clock.clone(), journal.clone(), health.clone(), transport));
        let dispatcher = Arc::new(NodeActionDispatcher::new(clock.clone(), journal.clone(), registry.clone(), health.clone(), ui.clone()));
        let log_forwarder = LogForwarder::spawn(clock.clone(), journal.clone(), ui.clone());
        let coordinator = Arc::new(MasterActionCoordinator::new(
            clock,
            journal.clone(),
            registry.clone(),
            dispatcher.clone(),
            ui,
            log_forwarder.clone(),
            handlers,
        ));
        let router = Arc::new(InboundRouter::new(dispatcher.clone(), health.clone()));

        let shutdown = CancellationToken::new();
        let sweep_task = spawn_overdue_sweep(health.clone(), shutdown.clone());

        Ok(Self { journal, health, registry, dispatcher, coordinator, log_forwarder, router, shutdown, sweep_task })
    }

    /// Stops the background sweep and flushes any buffered log lines
    /// (spec.md §4.6 "Flush barrier"). Does not wait for an in-flight
    /// MasterAction to finish; callers that need that should drain via
    /// `coordinator.get_status` before calling this.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.sweep_task.await;
        self.log_forwarder.flush().await;
    }
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;
