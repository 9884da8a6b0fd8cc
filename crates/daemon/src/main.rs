// SPDX-License-Identifier: MIT

//! `masterd` entry point: resolves configuration, installs logging, wires
//! the six components together, and runs until interrupted (SPEC_FULL §4
//! "Daemon lifecycle").
//!
//! No concrete `AgentTransport`/`UiNotifier` ships with this workspace
//! (spec.md §1): the binary runs against the in-memory fakes behind the
//! `test-support` feature, which is on by default, as a runnable reference.
//! A real deployment provides its own hub transport and UI sink in their
//! place.

use fleet_core::SystemClock;
use fleet_daemon::{Config, Daemon};
use fleet_engine::HandlerRegistry;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = Config::from_env();
    let _log_guard = fleet_daemon::logging::init(&config);

    tracing::info!(state_dir = %config.state_dir.display(), environment = %config.environment_name, "starting masterd");

    let transport = demo_transport();
    let ui = demo_ui();
    let handlers = HandlerRegistry::new();

    let daemon = match Daemon::bootstrap(&config, SystemClock, transport, ui, handlers).await {
        Ok(daemon) => daemon,
        Err(err) => {
            tracing::error!(error = %err, "failed to start masterd");
            std::process::exit(1);
        }
    };

    tracing::info!("masterd ready");

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install Ctrl-C handler");
    }

    tracing::info!("masterd shutting down");
    daemon.shutdown().await;
}

#[cfg(feature = "test-support")]
fn demo_transport() -> Arc<dyn fleet_wire::AgentTransport> {
    Arc::new(fleet_wire::FakeAgentTransport::new())
}

#[cfg(feature = "test-support")]
fn demo_ui() -> Arc<dyn fleet_wire::UiNotifier> {
    Arc::new(fleet_wire::FakeUiNotifier::new())
}
