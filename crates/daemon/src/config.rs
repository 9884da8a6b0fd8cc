// SPDX-License-Identifier: MIT

//! Environment-variable configuration, mirroring the teacher's `env.rs`
//! override/default shape (SPEC_FULL §4 "Configuration").

use std::path::PathBuf;

/// Resolved daemon configuration. Every field has a `MASTER_*` environment
/// override and a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Journal root directory (`MASTER_STATE_DIR`).
    pub state_dir: PathBuf,
    /// Environment name segment under the journal root (`MASTER_ENVIRONMENT_NAME`).
    pub environment_name: String,
    /// Heartbeat interval in seconds; derived offline/unreachable/sweep
    /// thresholds are computed from this (spec.md §4.2), not configured
    /// independently (`MASTER_HEARTBEAT_INTERVAL_SECS`).
    pub heartbeat_interval_secs: u64,
    /// `tracing_subscriber::EnvFilter` directive (`MASTER_LOG`).
    pub log_filter: String,
    /// Optional directory for a non-blocking rolling file appender, in
    /// addition to stderr (`MASTER_LOG_DIR`). No `MASTER_LOG_DIR` means
    /// stderr-only logging.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Resolve from the process environment, falling back to defaults
    /// (SPEC_FULL §4 "Configuration").
    pub fn from_env() -> Self {
        Self {
            state_dir: state_dir(),
            environment_name: env_var("MASTER_ENVIRONMENT_NAME").unwrap_or_else(|| "default".to_string()),
            heartbeat_interval_secs: env_var("MASTER_HEARTBEAT_INTERVAL_SECS").and_then(|s| s.parse().ok()).unwrap_or(10),
            log_filter: env_var("MASTER_LOG").unwrap_or_else(|| "info".to_string()),
            log_dir: env_var("MASTER_LOG_DIR").map(PathBuf::from),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// `MASTER_STATE_DIR` > `$XDG_STATE_HOME/master` > `~/.local/state/master`.
fn state_dir() -> PathBuf {
    if let Some(dir) = env_var("MASTER_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Some(xdg) = env_var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("master");
    }
    let home = env_var("HOME").unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home).join(".local/state/master")
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
