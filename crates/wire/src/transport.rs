// SPDX-License-Identifier: MIT

//! The seam between the core and the bidirectional agent transport (hub),
//! which spec.md §1 places out of scope. The core only ever calls
//! [`AgentTransport::send`]; a real hub implementation (websocket, gRPC
//! stream, whatever) lives outside this workspace and is supplied at
//! daemon wiring time.

use crate::messages::MasterToSlave;
use async_trait::async_trait;
use thiserror::Error;

/// Failure sending a message to a node's agent.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("node '{0}' is not connected")]
    UnknownNode(String),
    #[error("send to '{node}' failed: {reason}")]
    SendFailed { node: String, reason: String },
}

/// Bidirectional agent transport, consumed by the AgentRegistry (spec.md §4.3).
///
/// A send to an unknown node is a logged no-op at the call site, not an
/// error from this trait — callers that need the distinction match on
/// [`TransportError::UnknownNode`].
#[async_trait]
pub trait AgentTransport: Send + Sync + 'static {
    async fn send(&self, node_name: &str, message: MasterToSlave) -> Result<(), TransportError>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashSet;

    /// An in-memory [`AgentTransport`] that records every send and can be
    /// told which nodes are "connected" and which sends should fail, so
    /// S1–S7 (spec.md §8) can run without a real network.
    #[derive(Default)]
    pub struct FakeAgentTransport {
        sent: Mutex<Vec<(String, MasterToSlave)>>,
        connected: Mutex<HashSet<String>>,
        failing: Mutex<HashSet<String>>,
    }

    impl FakeAgentTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn connect(&self, node_name: impl Into<String>) {
            self.connected.lock().insert(node_name.into());
        }

        pub fn disconnect(&self, node_name: &str) {
            self.connected.lock().remove(node_name);
        }

        pub fn fail_sends_to(&self, node_name: impl Into<String>) {
            self.failing.lock().insert(node_name.into());
        }

        pub fn sent_messages(&self) -> Vec<(String, MasterToSlave)> {
            self.sent.lock().clone()
        }
    }

    #[async_trait]
    impl AgentTransport for FakeAgentTransport {
        async fn send(&self, node_name: &str, message: MasterToSlave) -> Result<(), TransportError> {
            if self.failing.lock().contains(node_name) {
                return Err(TransportError::SendFailed { node: node_name.to_string(), reason: "simulated failure".into() });
            }
            if !self.connected.lock().contains(node_name) {
                return Err(TransportError::UnknownNode(node_name.to_string()));
            }
            self.sent.lock().push((node_name.to_string(), message));
            Ok(())
        }
    }
}
