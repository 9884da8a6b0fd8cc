// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Per §7 ("JournalFailure"): disk/serialization errors on a single file
/// are caught at the call site and logged, not propagated as a hard error
/// out of the Journal's public methods — this type exists for the few
/// callers (tests, the daemon bootstrap's recovery scan) that need to
/// observe a failure directly rather than have it absorbed.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("i/o error at {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("serialization error at {path}: {source}")]
    Json { path: String, #[source] source: serde_json::Error },
    #[error("not found: {0}")]
    NotFound(String),
}

impl JournalError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        JournalError::Io { path: path.into(), source }
    }

    pub fn json(path: impl Into<String>, source: serde_json::Error) -> Self {
        JournalError::Json { path: path.into(), source }
    }
}
