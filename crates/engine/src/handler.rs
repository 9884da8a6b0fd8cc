// SPDX-License-Identifier: MIT

//! Handler registry plug point (spec.md §9 Design Notes: "operation-type →
//! handler is a polymorphic plug point... a table of handlers indexed by
//! enum variant"). Per spec.md §1, concrete handler business logic is out
//! of scope — this module is only the seam the Coordinator resolves
//! against.

use crate::dispatcher::NodeActionDispatcher;
use crate::error::HandlerError;
use crate::log_forwarder::LogForwarder;
use async_trait::async_trait;
use fleet_agents::AgentRegistry;
use fleet_core::{Clock, MasterAction, MasterActionId, OperationType, ParamMap};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a handler needs to run one MasterAction, scoped to that run
/// (spec.md §4.5 "a handler context carrying the cancellation token, a
/// FlushLogs callable, a logger, and a reference to the live MasterAction").
pub struct HandlerContext<C: Clock> {
    pub action_id: MasterActionId,
    pub parameters: ParamMap,
    pub cancellation: CancellationToken,
    pub dispatcher: Arc<NodeActionDispatcher<C>>,
    pub registry: Arc<AgentRegistry<C>>,
    pub log_forwarder: Arc<LogForwarder<C>>,
    pub clock: C,
    /// The live MasterAction, for handlers that need to read/mutate stage
    /// bookkeeping beyond what `dispatcher.execute` already does (e.g.
    /// picking node targets from `parameters`). Owned by the Coordinator;
    /// the handler only ever borrows it for the duration of `run`.
    pub action: Arc<parking_lot::Mutex<MasterAction>>,
}

impl<C: Clock> HandlerContext<C> {
    pub fn log_info(&self, message: impl Into<String>) {
        self.log_forwarder.info(message);
    }

    pub fn log_warn(&self, message: impl Into<String>) {
        self.log_forwarder.warn(message);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// One MasterAction's business logic: decomposes the request into stages
/// and drives them through the Dispatcher. Out of scope per spec.md §1 —
/// the core only defines the seam.
#[async_trait]
pub trait MasterActionHandler<C: Clock>: Send + Sync + 'static {
    async fn run(&self, ctx: &HandlerContext<C>) -> Result<Option<ParamMap>, HandlerError>;
}

/// `OperationType → handler` lookup table (spec.md §4.5 "Handlers are
/// resolved from a registry keyed by operation type").
#[derive(Default)]
pub struct HandlerRegistry<C: Clock> {
    handlers: HashMap<OperationType, Arc<dyn MasterActionHandler<C>>>,
}

impl<C: Clock> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, operation_type: OperationType, handler: Arc<dyn MasterActionHandler<C>>) -> &mut Self {
        self.handlers.insert(operation_type, handler);
        self
    }

    pub fn resolve(&self, operation_type: OperationType) -> Option<Arc<dyn MasterActionHandler<C>>> {
        self.handlers.get(&operation_type).cloned()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! A minimal in-memory handler (spec.md SPEC_FULL §4 "Test doubles"):
    //! runs a single stage with one NodeTask per configured node and
    //! returns whatever the stage result carries. Exercises the full
    //! Coordinator → Dispatcher → Journal pipeline end to end without any
    //! real per-operation business logic.
    use super::*;
    use fleet_core::{NodeAction, NodeTask, Stage, TaskType};

    pub struct SingleStageHandler {
        pub stage_name: String,
        pub task_type: TaskType,
        pub nodes: Vec<String>,
        pub timeout_seconds: u64,
    }

    impl SingleStageHandler {
        pub fn new(stage_name: impl Into<String>, task_type: TaskType, nodes: Vec<String>) -> Self {
            Self { stage_name: stage_name.into(), task_type, nodes, timeout_seconds: 30 }
        }

        pub fn timeout_seconds(mut self, secs: u64) -> Self {
            self.timeout_seconds = secs;
            self
        }
    }

    #[async_trait]
    impl<C: Clock> MasterActionHandler<C> for SingleStageHandler {
        async fn run(&self, ctx: &HandlerContext<C>) -> Result<Option<ParamMap>, HandlerError> {
            let now = ctx.clock.epoch_ms();
            let tasks: Vec<NodeTask> =
                self.nodes.iter().map(|n| NodeTask::new(n.clone(), self.task_type.clone(), self.timeout_seconds, now)).collect();
            let stage_index = {
                let mut action = ctx.action.lock();
                let index = action.stages.len();
                let stage = Stage::new(index, self.stage_name.clone(), None, now);
                action.stages.push(stage);
                action.active_stage_index = Some(index);
                index
            };
            let node_action = NodeAction::new(stage_index, self.stage_name.clone(), tasks);

            let result = crate::dispatcher::run_stage(ctx, stage_index, &self.stage_name, node_action).await;
            if result.is_success {
                Ok(Some(ParamMap::new()))
            } else {
                Err(HandlerError::Failed(format!("stage '{}' did not succeed", self.stage_name)))
            }
        }
    }
}
