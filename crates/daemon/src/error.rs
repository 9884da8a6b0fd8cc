// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Startup/shutdown failures for the daemon bootstrap (SPEC_FULL §4
/// "Daemon lifecycle").
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to create state directory {path}: {source}")]
    StateDir { path: String, #[source] source: std::io::Error },
}
