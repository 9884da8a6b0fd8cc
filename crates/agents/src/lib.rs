// SPDX-License-Identifier: MIT

//! Agent connectivity for the Master orchestration engine: the
//! [`HealthMonitor`](health::HealthMonitor) (C2) that classifies node
//! connectivity from heartbeats and a periodic sweep, and the
//! [`AgentRegistry`](registry::AgentRegistry) (C3) that tracks which
//! agents are attached and exposes typed send primitives over an
//! [`fleet_wire::AgentTransport`] (spec.md §4.2, §4.3).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod health;
pub mod registry;

pub use error::{HealthError, RegistryError};
pub use health::{spawn_overdue_sweep, AgentInfo, DiagnosticsUpdate, HealthMonitor, HealthThresholds, Heartbeat};
pub use registry::AgentRegistry;
