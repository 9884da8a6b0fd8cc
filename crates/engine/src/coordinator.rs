// SPDX-License-Identifier: MIT

//! MasterActionCoordinator (C5): singleton admission, handler resolution,
//! per-action scoped context, stage sequencing glue, final log flush, and
//! terminal status write to the Journal (spec.md §4.5).

use crate::context::ActionContext;
use crate::error::CoordinatorError;
use crate::handler::{HandlerContext, HandlerRegistry, MasterActionHandler};
use crate::log_forwarder::LogForwarder;
use fleet_agents::AgentRegistry;
use fleet_core::{Clock, MasterAction, MasterActionId, MasterActionStatus, NodeTaskStatus, OperationType, ParamMap};
use fleet_journal::Journal;
use fleet_wire::{UiEvent, UiNotifier};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::dispatcher::NodeActionDispatcher;

/// Parameters for `MasterActionCoordinator::initiate` (spec.md §4.5,
/// §6 `POST /operations` body).
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub operation_type: OperationType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub parameters: ParamMap,
}

/// Response to `RequestCancel` (spec.md §4.5, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelResponse {
    CancellationPending,
    AlreadyCompleted,
    NotFound,
}

/// A single NodeTask's status, flattened for `StatusView`. The synthetic
/// `_master` entry (spec.md §4.5 "GetStatus... synthetic single-entry
/// list") doesn't correspond to a real NodeTask, so `StatusView` carries
/// this view type rather than `fleet_core::NodeTask` directly.
#[derive(Debug, Clone)]
pub struct NodeTaskView {
    pub node_name: String,
    pub status: NodeTaskStatus,
    pub progress_percent: u8,
    pub status_message: Option<String>,
    pub result_payload: Option<ParamMap>,
}

impl NodeTaskView {
    fn from_task(task: &fleet_core::NodeTask) -> Self {
        Self {
            node_name: task.node_name.clone(),
            status: task.status,
            progress_percent: task.progress_percent,
            status_message: task.status_message.clone(),
            result_payload: task.result_payload.clone(),
        }
    }

    fn synthetic_master(result: ParamMap) -> Self {
        Self {
            node_name: "_master".to_string(),
            status: NodeTaskStatus::Succeeded,
            progress_percent: 100,
            status_message: None,
            result_payload: Some(result),
        }
    }
}

/// Projection of a MasterAction returned by `GetStatus` (spec.md §4.5,
/// §6 `GET /operations/{id}`).
#[derive(Debug, Clone)]
pub struct StatusView {
    pub action_id: MasterActionId,
    pub operation_type: OperationType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: MasterActionStatus,
    pub progress_percent: u8,
    pub start_time_epoch_ms: u64,
    pub end_time_epoch_ms: Option<u64>,
    pub node_tasks: Vec<NodeTaskView>,
    pub result: Option<ParamMap>,
}

impl StatusView {
    /// Project a live or archived MasterAction (spec.md §4.5 "Status
    /// view"): prefer the node task list of the most recent/active stage;
    /// if there are none and a final result exists, fall back to the
    /// synthetic `_master` entry.
    fn from_action(action: &MasterAction) -> Self {
        let stage = action.active_stage().or_else(|| action.stages.last());
        let mut node_tasks: Vec<NodeTaskView> = stage.map(|s| s.node_tasks.iter().map(NodeTaskView::from_task).collect()).unwrap_or_default();
        if node_tasks.is_empty() {
            if let Some(result) = &action.result {
                node_tasks.push(NodeTaskView::synthetic_master(result.clone()));
            }
        }
        Self {
            action_id: action.id.clone(),
            operation_type: action.operation_type,
            name: action.name.clone(),
            description: action.description.clone(),
            status: action.status,
            progress_percent: action.progress_percent,
            start_time_epoch_ms: action.start_time_epoch_ms,
            end_time_epoch_ms: action.end_time_epoch_ms,
            node_tasks,
            result: action.result.clone(),
        }
    }
}

/// The currently running MasterAction's coordinator-side bookkeeping
/// (spec.md GLOSSARY "Admission slot"): one entry per admitted run, held in
/// the single-permit gate below.
struct RunningAction {
    action_id: MasterActionId,
    action: Arc<parking_lot::Mutex<MasterAction>>,
    cancellation: CancellationToken,
}

/// Singleton admission, handler resolution, and stage sequencing for
/// MasterAction runs (spec.md §4.5).
///
/// The admission slot is a `tokio::sync::Mutex<Option<RunningAction>>`
/// (spec.md GLOSSARY "Admission slot"): `try_lock` realizes the
/// zero-timeout try-acquire, and the slot's *contents* (not just the lock)
/// distinguish "nothing running" from "something running" so `RequestCancel`
/// can tell `AlreadyCompleted` apart from `NotFound`.
pub struct MasterActionCoordinator<C: Clock> {
    clock: C,
    journal: Arc<Journal>,
    registry: Arc<AgentRegistry<C>>,
    dispatcher: Arc<NodeActionDispatcher<C>>,
    ui: Arc<dyn UiNotifier>,
    log_forwarder: Arc<LogForwarder<C>>,
    handlers: HandlerRegistry<C>,
    running: tokio::sync::Mutex<Option<RunningAction>>,
}

impl<C: Clock> MasterActionCoordinator<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        clock: C,
        journal: Arc<Journal>,
        registry: Arc<AgentRegistry<C>>,
        dispatcher: Arc<NodeActionDispatcher<C>>,
        ui: Arc<dyn UiNotifier>,
        log_forwarder: Arc<LogForwarder<C>>,
        handlers: HandlerRegistry<C>,
    ) -> Self {
        Self { clock, journal, registry, dispatcher, ui, log_forwarder, handlers, running: tokio::sync::Mutex::new(None) }
    }

    /// Admit and start a new MasterAction run (spec.md §4.5 "Admission",
    /// "Execution").
    ///
    /// A try-acquire with zero timeout fails with `AnotherInProgress` if
    /// another run is already admitted. Handlers are resolved from the
    /// registry keyed by operation type; an unknown type fails with
    /// `UnsupportedOperation` before the slot is ever filled.
    pub async fn initiate(self: &Arc<Self>, request: InitiateRequest, initiator: impl Into<String>) -> Result<MasterAction, CoordinatorError> {
        let mut guard = self.running.try_lock().map_err(|_| CoordinatorError::AnotherInProgress)?;
        if guard.is_some() {
            return Err(CoordinatorError::AnotherInProgress);
        }
        let handler = self
            .handlers
            .resolve(request.operation_type)
            .ok_or_else(|| CoordinatorError::UnsupportedOperation(request.operation_type.to_string()))?;

        let now = self.clock.epoch_ms();
        let mut action = MasterAction::new(request.operation_type, initiator, request.parameters, now);
        action.name = request.name;
        action.description = request.description;
        action.status = MasterActionStatus::InProgress;
        self.journal.record_action_initiated(&action).await;

        let action_handle = Arc::new(parking_lot::Mutex::new(action.clone()));
        let cancellation = CancellationToken::new();
        *guard = Some(RunningAction { action_id: action.id.clone(), action: action_handle.clone(), cancellation: cancellation.clone() });
        drop(guard);

        let ctx = HandlerContext {
            action_id: action.id.clone(),
            parameters: action.parameters.clone(),
            cancellation,
            dispatcher: self.dispatcher.clone(),
            registry: self.registry.clone(),
            log_forwarder: self.log_forwarder.clone(),
            clock: self.clock.clone(),
            action: action_handle,
        };

        let this = self.clone();
        tokio::spawn(async move { this.run_handler(handler, ctx).await });

        Ok(action)
    }

    /// Run the resolved handler to completion under the ambient
    /// `MasterActionId` (spec.md §4.5 "Ambient context"), then — always,
    /// regardless of outcome — flush logs, write the terminal Journal
    /// record, clear the Journal's stage-routing maps, and release the
    /// admission slot (spec.md §4.5 "Execution", §4.1 "ClearMappings...
    /// invoked when a MasterAction completes").
    async fn run_handler(self: Arc<Self>, handler: Arc<dyn MasterActionHandler<C>>, ctx: HandlerContext<C>) {
        let action_id = ctx.action_id.clone();
        let cancellation = ctx.cancellation.clone();
        let action_handle = ctx.action.clone();

        let outcome = ActionContext::scope(action_id.clone(), handler.run(&ctx)).await;

        // Cancellation always wins over a late failure update (spec.md §7).
        let final_status = if cancellation.is_cancelled() {
            MasterActionStatus::Cancelled
        } else {
            match &outcome {
                Ok(_) => MasterActionStatus::Succeeded,
                Err(_) => MasterActionStatus::Failed,
            }
        };

        let now = self.clock.epoch_ms();
        let finished_action = {
            let mut action = action_handle.lock();
            match &outcome {
                Ok(Some(payload)) => {
                    action.result = Some(payload.clone());
                }
                Ok(None) => {}
                Err(e) => action.push_log(format!("workflow failed: {e}")),
            }
            action.finish(final_status, now);
            action.clone()
        };

        if let Some(payload) = &finished_action.result {
            self.journal.record_master_action_result(&action_id, payload).await;
        }
        self.ui
            .publish(UiEvent::OperationCompleted { action_id: action_id.clone(), status: final_status, result: finished_action.result.clone() })
            .await;

        self.log_forwarder.flush().await;
        self.journal.record_action_completed(&finished_action).await;
        self.journal.clear_mappings(&action_id);

        *self.running.lock().await = None;
    }

    /// Project the live or archived MasterAction's status (spec.md §4.5
    /// "Status view", §6 `GET /operations/{id}`).
    pub async fn get_status(&self, action_id: &MasterActionId) -> Option<StatusView> {
        {
            let guard = self.running.lock().await;
            if let Some(running) = guard.as_ref() {
                if &running.action_id == action_id {
                    let snapshot = running.action.lock().clone();
                    return Some(StatusView::from_action(&snapshot));
                }
            }
        }
        let archived = self.journal.get_archived_action(action_id).await?;
        Some(StatusView::from_action(&archived))
    }

    /// Request cancellation of a MasterAction (spec.md §4.5
    /// "Cancellation", §6 `POST /operations/{id}/cancel`).
    pub async fn request_cancel(&self, action_id: &MasterActionId, by: impl Into<String>) -> CancelResponse {
        let by = by.into();
        let guard = self.running.lock().await;
        if let Some(running) = guard.as_ref() {
            if &running.action_id == action_id {
                let terminal = running.action.lock().is_terminal();
                if terminal {
                    return CancelResponse::AlreadyCompleted;
                }
                running.action.lock().status = MasterActionStatus::Cancelling;
                tracing::info!(%action_id, by, "cancellation requested");
                running.cancellation.cancel();
                return CancelResponse::CancellationPending;
            }
        }
        drop(guard);

        match self.journal.get_archived_action(action_id).await {
            Some(_) => CancelResponse::AlreadyCompleted,
            None => CancelResponse::NotFound,
        }
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
