// SPDX-License-Identifier: MIT

//! NodeActionDispatcher (C4): executes one multi-node stage — readiness
//! check → dispatch → progress aggregation → terminal status → log-flush
//! barrier — with per-action cancellation, timeout, and health-fail
//! handling (spec.md §4.4).

use crate::error::DispatchError;
use crate::handler::HandlerContext;
use fleet_agents::AgentRegistry;
use fleet_agents::HealthMonitor;
use fleet_core::{
    parse_result_json, Clock, ConnectivityStatus, MasterActionId, MasterActionStatus, NodeAction, NodeActionId, NodeTask,
    NodeTaskId, NodeTaskStatus,
};
use fleet_journal::Journal;
use fleet_wire::{LogRecord, UiEvent, UiNotifier};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Notify};
use tokio_util::sync::CancellationToken;

const HEALTH_WATCH_INTERVAL: Duration = Duration::from_secs(15);
const READINESS_TIMEOUT: Duration = Duration::from_secs(30);
const CANCELLATION_WINDOW: Duration = Duration::from_secs(15);
const FLUSH_BARRIER_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of one `NodeActionDispatcher::execute` call (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct NodeActionResult {
    pub is_success: bool,
    pub final_state: NodeAction,
}

/// Per-execution state, one instance per live stage, keyed by
/// `nodeAction.id` (spec.md §4.4 "Per-execution state").
struct Execution<C: Clock> {
    clock: C,
    journal: Arc<Journal>,
    ui: Arc<dyn UiNotifier>,
    action_id: MasterActionId,
    stage_index: usize,
    stage_name: String,
    tasks: Mutex<Vec<NodeTask>>,
    completion_tx: Mutex<Option<oneshot::Sender<()>>>,
    flushed_nodes: Mutex<HashSet<String>>,
    flush_notify: Notify,
    /// Taken (dropped) once the stage reaches its terminal aggregate and the
    /// flush barrier has run, so the log consumer's `recv()` loop ends.
    log_tx: Mutex<Option<mpsc::UnboundedSender<LogRecord>>>,
    cancellation: CancellationToken,
    /// Cancelled at teardown regardless of outcome, to stop the health-watch
    /// and readiness-timeout loops even when the stage finished without the
    /// caller ever requesting cancellation (spec.md §4.4 step 9).
    teardown: CancellationToken,
}

impl<C: Clock> Execution<C> {
    fn find_task(tasks: &mut [NodeTask], task_id: &NodeTaskId) -> Option<&mut NodeTask> {
        tasks.iter_mut().find(|t| &t.task_id == task_id)
    }

    /// Recompute the aggregate status from current task state (spec.md
    /// §4.4.4), publish progress, and — on the first terminal transition —
    /// fire the completion slot exactly once.
    async fn recompute_and_report(&self) {
        let (progress, status) = {
            let tasks = self.tasks.lock();
            compute_aggregate(&tasks, self.cancellation.is_cancelled())
        };
        self.ui.publish(UiEvent::OperationProgress { action_id: self.action_id.clone(), status, progress_percent: progress }).await;

        if status.is_terminal() {
            if let Some(tx) = self.completion_tx.lock().take() {
                let _ = tx.send(());
            }
        }
    }

    /// Readiness report arrived for `task_id` (spec.md §4.4 step 2).
    /// Re-entrance on an already-terminal task is ignored.
    async fn on_readiness_report(
        &self,
        registry: &AgentRegistry<C>,
        node_action_id: &NodeActionId,
        task_id: NodeTaskId,
        is_ready: bool,
        reason_if_not_ready: Option<String>,
    ) {
        let now = self.clock.epoch_ms();
        let dispatch = {
            let mut tasks = self.tasks.lock();
            let Some(task) = Self::find_task(&mut tasks, &task_id) else { return };
            if task.is_terminal() {
                return;
            }
            if !is_ready {
                task.finish(NodeTaskStatus::NotReadyForTask, reason_if_not_ready, now);
                None
            } else {
                task.status = NodeTaskStatus::TaskDispatched;
                task.start_time_epoch_ms = Some(now);
                task.last_update_epoch_ms = now;
                Some((task.node_name.clone(), task.task_type.clone(), task.task_payload.clone(), task.timeout_seconds))
            }
        };

        if let Some((node_name, task_type, payload, timeout_seconds)) = dispatch {
            let parameters_json = serde_json::to_string(&payload).ok();
            // Transport failures are already journaled by the registry (spec.md §4.3);
            // the Dispatcher only absorbs TransportFailure here (spec.md §7).
            let _ = registry.send_slave_task(&node_name, node_action_id.clone(), task_id.clone(), task_type, parameters_json, timeout_seconds).await;
        }
        self.recompute_and_report().await;
    }

    /// Slave progress update arrived for `task_id` (spec.md §4.4 step 3).
    async fn on_task_progress(
        &self,
        action_id: &MasterActionId,
        stage_index: usize,
        stage_name: &str,
        task_id: NodeTaskId,
        status: NodeTaskStatus,
        progress_percent: Option<u8>,
        message: Option<String>,
        result_json: Option<String>,
        timestamp_epoch_ms: u64,
    ) {
        let result_task = {
            let mut tasks = self.tasks.lock();
            let Some(task) = Self::find_task(&mut tasks, &task_id) else { return };
            if task.is_terminal() {
                return;
            }
            if let Some(p) = progress_percent {
                task.set_progress(p);
            }
            if let Some(msg) = &message {
                task.status_message = Some(msg.clone());
            }
            task.last_update_epoch_ms = timestamp_epoch_ms;

            if status.is_terminal() {
                task.finish(status, message, timestamp_epoch_ms);
                task.result_payload = result_json.as_deref().map(parse_result_json);
                Some(task.clone())
            } else {
                task.status = status;
                None
            }
        };

        if let Some(task) = result_task {
            self.journal.record_node_task_result(action_id, stage_index, stage_name, &task).await;
        }
        self.recompute_and_report().await;
    }

    /// Health-watch loop tick (spec.md §4.4 step 1): fail any non-terminal
    /// task whose node's cached status is Offline/Unreachable.
    async fn fail_offline_tasks(&self, health: &HealthMonitor<C>) {
        let now = self.clock.epoch_ms();
        let offending: Vec<NodeTaskId> = {
            let tasks = self.tasks.lock();
            tasks
                .iter()
                .filter(|t| !t.is_terminal())
                .filter(|t| health.get_cached_state(&t.node_name).map(|s| s.status.is_gone()).unwrap_or(false))
                .map(|t| t.task_id.clone())
                .collect()
        };
        if offending.is_empty() {
            return;
        }
        {
            let mut tasks = self.tasks.lock();
            for task_id in &offending {
                if let Some(task) = Self::find_task(&mut tasks, task_id) {
                    task.finish(NodeTaskStatus::NodeOfflineDuringTask, Some("node went offline during task".to_string()), now);
                }
            }
        }
        self.recompute_and_report().await;
    }

    /// Readiness-timeout fire (spec.md §4.4 step 6): any task still in
    /// ReadinessCheckSent becomes terminal.
    async fn timeout_readiness(&self) {
        let now = self.clock.epoch_ms();
        let changed = {
            let mut tasks = self.tasks.lock();
            let mut any = false;
            for task in tasks.iter_mut() {
                if task.status == NodeTaskStatus::ReadinessCheckSent {
                    task.finish(NodeTaskStatus::ReadinessCheckTimedOut, Some("readiness check timed out".to_string()), now);
                    any = true;
                }
            }
            any
        };
        if changed {
            self.recompute_and_report().await;
        }
    }

    /// Per-task execution timeout fire (spec.md §4.4 step 7).
    async fn timeout_execution(&self, task_id: NodeTaskId) {
        let now = self.clock.epoch_ms();
        let changed = {
            let mut tasks = self.tasks.lock();
            match Self::find_task(&mut tasks, &task_id) {
                Some(task) if !task.is_terminal() => {
                    task.finish(NodeTaskStatus::TimedOut, Some("execution timed out".to_string()), now);
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.recompute_and_report().await;
        }
    }

    /// Cancellation branch (spec.md §4.4 step 5).
    async fn run_cancellation(&self, registry: &AgentRegistry<C>, health: &HealthMonitor<C>, node_action_id: &NodeActionId) {
        let now = self.clock.epoch_ms();
        self.recompute_and_report().await; // publish Cancelling immediately

        let to_cancel: Vec<(NodeTaskId, String)> = {
            let mut tasks = self.tasks.lock();
            let mut to_cancel = Vec::new();
            for task in tasks.iter_mut() {
                if task.is_terminal() {
                    continue;
                }
                let offline = health.get_cached_state(&task.node_name).map(|s| s.status.is_gone()).unwrap_or(false);
                if offline {
                    task.finish(NodeTaskStatus::Cancelled, Some("node unreachable, cancelled without contacting it".to_string()), now);
                } else {
                    task.status = NodeTaskStatus::Cancelling;
                    to_cancel.push((task.task_id.clone(), task.node_name.clone()));
                }
            }
            to_cancel
        };

        for (task_id, node_name) in &to_cancel {
            let _ = registry.send_cancel_task(node_name, node_action_id.clone(), task_id.clone(), "cancellation requested".to_string()).await;
        }
        self.recompute_and_report().await;

        let deadline = tokio::time::Instant::now() + CANCELLATION_WINDOW;
        loop {
            let still_cancelling: Vec<String> = {
                let tasks = self.tasks.lock();
                tasks.iter().filter(|t| t.status == NodeTaskStatus::Cancelling).map(|t| t.node_name.clone()).collect()
            };
            if still_cancelling.is_empty() {
                break;
            }
            let all_gone = still_cancelling.iter().all(|node| health.get_cached_state(node).map(|s| s.status.is_gone()).unwrap_or(false));
            if all_gone || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(200).min(deadline.saturating_duration_since(tokio::time::Instant::now()))).await;
        }

        let now = self.clock.epoch_ms();
        {
            let mut tasks = self.tasks.lock();
            for task in tasks.iter_mut() {
                if task.status == NodeTaskStatus::Cancelling {
                    task.finish(NodeTaskStatus::Cancelled, Some("forced cancellation after cancellation window elapsed".to_string()), now);
                }
            }
        }
        self.recompute_and_report().await;
    }

    /// End-of-stage log-flush barrier (spec.md §4.4 step 8).
    async fn flush_barrier(&self, registry: &AgentRegistry<C>, health: &HealthMonitor<C>, node_action_id: &NodeActionId) {
        let participant_nodes: Vec<String> = {
            let tasks = self.tasks.lock();
            tasks.iter().map(|t| t.node_name.clone()).collect::<HashSet<_>>().into_iter().collect()
        };
        let online_nodes: Vec<String> =
            participant_nodes.into_iter().filter(|n| health.get_cached_state(n).map(|s| s.status == ConnectivityStatus::Online).unwrap_or(false)).collect();

        if online_nodes.is_empty() {
            return;
        }
        for node in &online_nodes {
            let _ = registry.send_log_flush_request(node, node_action_id.clone()).await;
        }

        let deadline = tokio::time::Instant::now() + FLUSH_BARRIER_TIMEOUT;
        loop {
            let confirmed = self.flushed_nodes.lock().len();
            if confirmed >= online_nodes.len() || tokio::time::Instant::now() >= deadline {
                break;
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            tokio::select! {
                _ = self.flush_notify.notified() => {}
                _ = tokio::time::sleep(remaining) => break,
            }
        }
    }

    /// A node confirmed its log flush (spec.md §4.4 step 8).
    fn confirm_flush(&self, node_name: &str) {
        self.flushed_nodes.lock().insert(node_name.to_string());
        self.flush_notify.notify_waiters();
    }
}

/// Pure computation of the aggregate status from current task state
/// (spec.md §4.4.4). Resolution of the spec's self-described ambiguity
/// (§9 Open Questions): cancellation wins first, then an all-Succeeded
/// group is Succeeded, then a terminal group with any SucceededWithIssues
/// and no outright failure is SucceededWithErrors, otherwise Failed —
/// recorded in DESIGN.md.
fn compute_aggregate(tasks: &[NodeTask], cancelling: bool) -> (u8, MasterActionStatus) {
    let all_terminal = !tasks.is_empty() && tasks.iter().all(|t| t.is_terminal());
    let progress = if all_terminal {
        100
    } else {
        let non_terminal: Vec<&NodeTask> = tasks.iter().filter(|t| !t.is_terminal()).collect();
        if non_terminal.is_empty() {
            100
        } else {
            (non_terminal.iter().map(|t| t.progress_percent as u32).sum::<u32>() / non_terminal.len() as u32) as u8
        }
    };

    if !all_terminal {
        return (progress, if cancelling { MasterActionStatus::Cancelling } else { MasterActionStatus::InProgress });
    }
    if tasks.iter().any(|t| matches!(t.status, NodeTaskStatus::Cancelled | NodeTaskStatus::Cancelling)) {
        return (progress, MasterActionStatus::Cancelled);
    }
    if tasks.iter().all(|t| t.status.is_succeeded()) {
        return (progress, MasterActionStatus::Succeeded);
    }
    let any_outright_failure = tasks.iter().any(|t| !t.status.is_succeeded() && !t.status.is_succeeded_with_issues());
    if any_outright_failure {
        return (progress, MasterActionStatus::Failed);
    }
    (progress, MasterActionStatus::SucceededWithErrors)
}

/// Executes one multi-node stage (spec.md §4.4).
pub struct NodeActionDispatcher<C: Clock> {
    clock: C,
    journal: Arc<Journal>,
    registry: Arc<AgentRegistry<C>>,
    health: Arc<HealthMonitor<C>>,
    ui: Arc<dyn UiNotifier>,
    executions: Mutex<HashMap<NodeActionId, Arc<Execution<C>>>>,
    task_owner: Mutex<HashMap<NodeTaskId, NodeActionId>>,
}

impl<C: Clock> NodeActionDispatcher<C> {
    pub fn new(clock: C, journal: Arc<Journal>, registry: Arc<AgentRegistry<C>>, health: Arc<HealthMonitor<C>>, ui: Arc<dyn UiNotifier>) -> Self {
        Self { clock, journal, registry, health, ui, executions: Mutex::new(HashMap::new()), task_owner: Mutex::new(HashMap::new()) }
    }

    fn execution_for(&self, node_action_id: &NodeActionId) -> Option<Arc<Execution<C>>> {
        self.executions.lock().get(node_action_id).cloned()
    }

    /// A `ReadinessReport` arrived from a slave. Routed by task id since
    /// the wire message doesn't carry the node_action_id directly.
    pub async fn handle_readiness_report(&self, task_id: NodeTaskId, is_ready: bool, reason_if_not_ready: Option<String>) {
        let Some(node_action_id) = self.task_owner.lock().get(&task_id).cloned() else {
            tracing::warn!(task_id = %task_id.as_str(), "readiness report for unknown task dropped");
            return;
        };
        let Some(execution) = self.execution_for(&node_action_id) else { return };
        execution.on_readiness_report(&self.registry, &node_action_id, task_id, is_ready, reason_if_not_ready).await;
    }

    /// A `TaskProgressUpdate` arrived from a slave.
    #[allow(clippy::too_many_arguments)]
    pub async fn handle_task_progress(
        &self,
        node_action_id: NodeActionId,
        task_id: NodeTaskId,
        status: NodeTaskStatus,
        progress_percent: Option<u8>,
        message: Option<String>,
        result_json: Option<String>,
        timestamp_epoch_ms: u64,
    ) {
        let Some(execution) = self.execution_for(&node_action_id) else {
            tracing::warn!(node_action_id = %node_action_id.as_str(), "progress update for unknown nodeAction dropped");
            return;
        };
        execution
            .on_task_progress(
                &execution.action_id,
                execution.stage_index,
                &execution.stage_name,
                task_id,
                status,
                progress_percent,
                message,
                result_json,
                timestamp_epoch_ms,
            )
            .await;
    }

    /// A `LogEntry` arrived from a slave; forwarded onto the stage's own
    /// single-reader channel so ordering is preserved end-to-end (spec.md
    /// §5 "Ordering guarantees").
    pub fn handle_log_entry(&self, entry: LogRecord) {
        let Some(execution) = self.execution_for(&entry.node_action_id) else {
            tracing::warn!(node_action_id = %entry.node_action_id.as_str(), "log entry for unmapped nodeAction dropped");
            return;
        };
        if let Some(tx) = execution.log_tx.lock().as_ref() {
            let _ = tx.send(entry);
        }
    }

    /// A node confirmed `RequestLogFlushForTask`.
    pub fn handle_log_flush_confirmed(&self, node_action_id: &NodeActionId, node_name: &str) {
        if let Some(execution) = self.execution_for(node_action_id) {
            execution.confirm_flush(node_name);
        }
    }

    /// Execute one multi-node stage end to end (spec.md §4.4).
    pub async fn execute(
        self: &Arc<Self>,
        action_id: MasterActionId,
        node_action: NodeAction,
        parent_cancel: &CancellationToken,
    ) -> Result<NodeActionResult, DispatchError> {
        if node_action.tasks.is_empty() {
            return Err(DispatchError::EmptyNodeAction(node_action.id.to_string()));
        }
        let node_action_id = node_action.id.clone();
        let stage_index = node_action.stage_index;
        let stage_name = node_action.stage_name.clone();

        self.journal.map_node_action_to_stage(&action_id, stage_index, &stage_name, &node_action_id);

        let (log_tx, mut log_rx) = mpsc::unbounded_channel::<LogRecord>();
        let (completion_tx, completion_rx) = oneshot::channel::<()>();
        let cancellation = parent_cancel.child_token();
        let teardown = CancellationToken::new();

        let execution = Arc::new(Execution {
            clock: self.clock.clone(),
            journal: self.journal.clone(),
            ui: self.ui.clone(),
            action_id: action_id.clone(),
            stage_index,
            stage_name: stage_name.clone(),
            tasks: Mutex::new(node_action.tasks),
            completion_tx: Mutex::new(Some(completion_tx)),
            flushed_nodes: Mutex::new(HashSet::new()),
            flush_notify: Notify::new(),
            log_tx: Mutex::new(Some(log_tx)),
            cancellation: cancellation.clone(),
            teardown: teardown.clone(),
        });

        self.executions.lock().insert(node_action_id.clone(), execution.clone());
        {
            let mut owner = self.task_owner.lock();
            for task in execution.tasks.lock().iter() {
                owner.insert(task.task_id.clone(), node_action_id.clone());
            }
        }

        // 1. Background log consumer (single reader preserves per-node order).
        let journal_for_logs = self.journal.clone();
        let log_consumer = tokio::spawn(async move {
            while let Some(entry) = log_rx.recv().await {
                journal_for_logs.append_slave_log_to_stage(&entry).await;
            }
        });

        // 2. Health-watch loop: every 15s, fail tasks whose node dropped.
        let health_for_watch = self.health.clone();
        let exec_for_watch = execution.clone();
        let teardown_for_watch = teardown.clone();
        let health_watch = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = teardown_for_watch.cancelled() => break,
                    _ = tokio::time::sleep(HEALTH_WATCH_INTERVAL) => {
                        exec_for_watch.fail_offline_tasks(&health_for_watch).await;
                    }
                }
            }
        });

        // 3. Readiness-timeout watch: one-shot, 30s.
        let exec_for_rt = execution.clone();
        let teardown_for_rt = teardown.clone();
        let readiness_timeout = tokio::spawn(async move {
            tokio::select! {
                _ = teardown_for_rt.cancelled() => {}
                _ = tokio::time::sleep(READINESS_TIMEOUT) => exec_for_rt.timeout_readiness().await,
            }
        });

        // Readiness phase (spec.md §4.4 step 2).
        self.send_readiness_checks(&execution, &node_action_id).await;

        // Cancellation watcher.
        let exec_for_cancel = execution.clone();
        let registry_for_cancel = self.registry.clone();
        let health_for_cancel = self.health.clone();
        let node_action_for_cancel = node_action_id.clone();
        let cancel_token_for_watcher = cancellation.clone();
        let cancel_watch = tokio::spawn(async move {
            cancel_token_for_watcher.cancelled().await;
            exec_for_cancel.run_cancellation(&registry_for_cancel, &health_for_cancel, &node_action_for_cancel).await;
        });

        // Per-task execution timeouts, armed individually at dispatch time
        // inside `on_readiness_report`; spawned here as one watcher per task
        // up front, each waiting on the task's own timeout duration and
        // checking at fire time whether the task ever actually started.
        let exec_timeouts = self.spawn_execution_timeouts(&execution, &teardown);

        let _ = completion_rx.await;

        teardown.cancel();
        let _ = health_watch.await;
        let _ = readiness_timeout.await;
        for handle in exec_timeouts {
            handle.abort();
        }
        cancel_watch.abort();

        self.flush_barrier_for(&execution, &node_action_id).await;

        execution.log_tx.lock().take();
        let _ = log_consumer.await;

        self.executions.lock().remove(&node_action_id);
        {
            let mut owner = self.task_owner.lock();
            let ids: Vec<NodeTaskId> = execution.tasks.lock().iter().map(|t| t.task_id.clone()).collect();
            for id in ids {
                owner.remove(&id);
            }
        }

        let final_tasks = execution.tasks.lock().clone();
        let is_success = final_tasks.iter().all(|t| t.status.is_succeeded() || t.status.is_succeeded_with_issues());
        Ok(NodeActionResult { is_success, final_state: NodeAction { id: node_action_id, stage_index, stage_name, tasks: final_tasks } })
    }

    async fn send_readiness_checks(&self, execution: &Arc<Execution<C>>, node_action_id: &NodeActionId) {
        let now = self.clock.epoch_ms();
        let pending: Vec<(NodeTaskId, String, fleet_core::TaskType, String, Option<String>)> = {
            let mut tasks = execution.tasks.lock();
            tasks
                .iter_mut()
                .map(|task| {
                    task.status = NodeTaskStatus::ReadinessCheckSent;
                    task.last_update_epoch_ms = now;
                    let params_json = serde_json::to_string(&task.task_payload).unwrap_or_else(|_| "{}".to_string());
                    (task.task_id.clone(), task.node_name.clone(), task.task_type.clone(), params_json, task.target_resource.clone())
                })
                .collect()
        };
        for (task_id, node_name, task_type, params_json, target_resource) in pending {
            let _ = self.registry.send_prepare_for_task(&node_name, node_action_id.clone(), task_id, task_type, params_json, target_resource).await;
        }
    }

    fn spawn_execution_timeouts(&self, execution: &Arc<Execution<C>>, teardown: &CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
        let task_ids_and_timeouts: Vec<(NodeTaskId, u64)> = execution.tasks.lock().iter().map(|t| (t.task_id.clone(), t.timeout_seconds)).collect();
        task_ids_and_timeouts
            .into_iter()
            .map(|(task_id, timeout_seconds)| {
                let exec = execution.clone();
                let teardown = teardown.clone();
                tokio::spawn(async move {
                    tokio::select! {
                        _ = teardown.cancelled() => {}
                        _ = tokio::time::sleep(Duration::from_secs(timeout_seconds)) => exec.timeout_execution(task_id).await,
                    }
                })
            })
            .collect()
    }

    async fn flush_barrier_for(&self, execution: &Arc<Execution<C>>, node_action_id: &NodeActionId) {
        execution.flush_barrier(&self.registry, &self.health, node_action_id).await;
    }
}

/// Stage-lifecycle glue used by handlers (spec.md SPEC_FULL §4 "Test
/// doubles"): journals stage initiation/completion around one
/// `Dispatcher::execute` call, and records the stage result.
///
/// Runs under a [`crate::context::StageContext`] scope so any
/// `ctx.log_info`/`log_warn` call the handler makes while a stage is
/// in-flight is tagged with this stage's index/name for the LogForwarder
/// (spec.md §4.5 "Ambient context"). Per spec.md §4.1, `ClearMappings` is
/// invoked once when the whole MasterAction completes, not after each
/// stage — the Coordinator owns that call, not this function.
pub async fn run_stage<C: Clock>(
    ctx: &HandlerContext<C>,
    stage_index: usize,
    stage_name: &str,
    node_action: NodeAction,
) -> NodeActionResult {
    let now = ctx.clock.epoch_ms();
    let initial_stage = ctx.action.lock().stages[stage_index].clone();
    ctx.dispatcher.journal.record_stage_initiated(&ctx.action_id, &initial_stage).await;

    let result = crate::context::StageContext::scope(stage_index, stage_name.to_string(), ctx.dispatcher.execute(ctx.action_id.clone(), node_action, &ctx.cancellation))
        .await
        .unwrap_or_else(|_| NodeActionResult { is_success: false, final_state: NodeAction::new(stage_index, stage_name, Vec::new()) });

    let stage_progress = {
        let tasks = &result.final_state.tasks;
        if tasks.is_empty() {
            100
        } else {
            (tasks.iter().map(|t| t.progress_percent as u32).sum::<u32>() / tasks.len() as u32) as u8
        }
    };

    let completed_stage = {
        let mut action = ctx.action.lock();
        let stage = &mut action.stages[stage_index];
        stage.node_tasks = result.final_state.tasks.clone();
        stage.finish(result.is_success, None, now);
        action.active_stage_index = None;
        action.progress_percent = action.progress_percent.max(stage_progress);
        stage.clone()
    };
    ctx.dispatcher.journal.record_stage_completed(&ctx.action_id, &completed_stage).await;

    result
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
