// SPDX-License-Identifier: MIT

//! Daemon bootstrap for the Master orchestration engine: resolves
//! configuration from the environment, wires the six core components
//! together, runs the startup crash-recovery scan, and installs the
//! `tracing` subscriber (SPEC_FULL §4 "Daemon lifecycle").

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod logging;
pub mod router;

pub use bootstrap::Daemon;
pub use config::Config;
pub use error::DaemonError;
pub use router::InboundRouter;
