// SPDX-License-Identifier: MIT

//! The seam between the core and the UI notification bus (spec.md §1,
//! out of scope) that the core publishes one-way events onto (spec.md §6).

use async_trait::async_trait;
use fleet_core::{ChangeId, ConnectivityStatus, MasterActionId, MasterActionStatus, ParamMap};
use serde::{Deserialize, Serialize};

/// One-way event published to subscribed UIs (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum UiEvent {
    NodeStatusUpdate {
        node_name: String,
        status: ConnectivityStatus,
    },
    OperationProgress {
        action_id: MasterActionId,
        status: MasterActionStatus,
        progress_percent: u8,
    },
    OperationCompleted {
        action_id: MasterActionId,
        status: MasterActionStatus,
        result: Option<ParamMap>,
    },
    OperationLogEntry {
        action_id: MasterActionId,
        node_name: String,
        message: String,
    },
    MasterGoingDown,
    MasterReconnected,
    EnvironmentManifestUpdated,
    HealthCheckIssueFound {
        node_name: String,
        summary: String,
    },
    AuditLogEntryAdded {
        change_id: ChangeId,
        event_type: String,
    },
}

/// Publish-only seam to the UI notification bus.
#[async_trait]
pub trait UiNotifier: Send + Sync + 'static {
    async fn publish(&self, event: UiEvent);
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;

    /// An in-memory [`UiNotifier`] that records every published event.
    #[derive(Default)]
    pub struct FakeUiNotifier {
        events: Mutex<Vec<UiEvent>>,
    }

    impl FakeUiNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<UiEvent> {
            self.events.lock().clone()
        }
    }

    #[async_trait]
    impl UiNotifier for FakeUiNotifier {
        async fn publish(&self, event: UiEvent) {
            self.events.lock().push(event);
        }
    }
}
