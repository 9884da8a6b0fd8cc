// SPDX-License-Identifier: MIT

//! Wire protocol for the Master orchestration engine.
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload.
//!
//! This crate defines the Master↔Slave message shapes (spec.md §6), the
//! two seams the core consumes for its out-of-scope collaborators
//! ([`AgentTransport`], [`UiNotifier`]), and the framing codec a concrete
//! hub transport can reuse.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod codec;
mod messages;
mod transport;
mod ui;

pub use codec::{decode, encode, read_message, write_message, ProtocolError};
pub use messages::{format_timestamp, LogLevel, LogRecord, MasterToSlave, SlaveToMaster};
pub use transport::{AgentTransport, TransportError};
pub use ui::{UiEvent, UiNotifier};

#[cfg(any(test, feature = "test-support"))]
pub use transport::fake::FakeAgentTransport;
#[cfg(any(test, feature = "test-support"))]
pub use ui::fake::FakeUiNotifier;
