// SPDX-License-Identifier: MIT

//! The Journal (C1): durable filesystem-backed Action Journal and Change
//! Journal with its stateless log-fan-in pipeline (spec.md §4.1).

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod error;
mod journal;
mod layout;
mod locks;
mod records;

pub use error::JournalError;
pub use journal::{ChangeSummary, Journal, ListChangesFilter};
pub use layout::EnvironmentLayout;
pub use records::{ActionIndexEntry, NodeTaskResultDoc, StageInfo, StageResultDoc};
