// SPDX-License-Identifier: MIT

//! Error taxonomy for the execution layer (spec.md §7: AdmissionFailure,
//! WorkflowFailure propagate through these; NodeFailure/TransportFailure/
//! JournalFailure are absorbed at their own layers).

use thiserror::Error;

/// Errors returned synchronously from the Dispatcher's `Execute` contract.
/// Per-task failures are not represented here — they are absorbed into the
/// aggregate [`crate::dispatcher::NodeActionResult`] instead (spec.md §7
/// "NodeFailure... does not abort sibling tasks").
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("node action '{0}' has no tasks to execute")]
    EmptyNodeAction(String),
}

/// Errors returned synchronously from the Coordinator's admission/cancel
/// contract (spec.md §7 "AdmissionFailure").
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("another MasterAction is already in progress")]
    AnotherInProgress,
    #[error("unsupported operation type '{0}'")]
    UnsupportedOperation(String),
}

/// Error returned by a [`crate::handler::MasterActionHandler`] (spec.md §7
/// "WorkflowFailure").
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Failed(String),
}
