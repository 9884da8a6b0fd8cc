// SPDX-License-Identifier: MIT

//! Ambient workflow context (spec.md §4.5 "Ambient context", §9 "Ambient
//! workflow context"): the currently executing MasterAction id, and —
//! while a stage is running — its index and name, visible to any logging
//! call on the executing task without the handler threading the id through
//! every call site.
//!
//! Backed by [`tokio::task_local!`] rather than a plain thread-local: the
//! Coordinator and Dispatcher run handler/stage code as spawned tasks, and
//! `task_local!` values are inherited by everything spawned *within*
//! `ActionContext::scope`/`StageContext::scope`, including background
//! timers and the log consumer, which is exactly the propagation spec.md §9
//! asks for ("captured at task spawn so background timers/consumers see
//! it").

use fleet_core::MasterActionId;
use std::future::Future;

tokio::task_local! {
    static ACTION_ID: MasterActionId;
    static STAGE: (usize, String);
}

/// Establishes the ambient `MasterActionId` for the duration of `fut`.
pub struct ActionContext;

impl ActionContext {
    /// Run `fut` with `action_id` as the ambient MasterAction id.
    pub async fn scope<F: Future>(action_id: MasterActionId, fut: F) -> F::Output {
        ACTION_ID.scope(action_id, fut).await
    }

    /// The ambient MasterAction id, if one is established on this task.
    pub fn current() -> Option<MasterActionId> {
        ACTION_ID.try_with(|id| id.clone()).ok()
    }
}

/// Establishes the ambient stage index/name for the duration of `fut`,
/// nested inside an [`ActionContext::scope`].
pub struct StageContext;

impl StageContext {
    pub async fn scope<F: Future>(stage_index: usize, stage_name: impl Into<String>, fut: F) -> F::Output {
        STAGE.scope((stage_index, stage_name.into()), fut).await
    }

    /// The ambient stage index/name, if a stage is currently executing on
    /// this task.
    pub fn current() -> Option<(usize, String)> {
        STAGE.try_with(|s| s.clone()).ok()
    }
}

/// A snapshot of the ambient context, capturable on one task and re-applied
/// on another. `tokio::task_local!` values are *not* inherited by
/// `tokio::spawn` — a spawned task starts with no ambient scope at all — so
/// every background activity the Dispatcher/Coordinator spawns (readiness
/// watch, health-watch loop, log consumer, per-task timeout) must capture
/// this at spawn time and re-enter it inside the new task, per spec.md §9's
/// "must ensure the value is captured at task spawn so background timers/
/// consumers see it".
#[derive(Clone)]
pub struct ContextSnapshot {
    action_id: Option<MasterActionId>,
    stage: Option<(usize, String)>,
}

impl ContextSnapshot {
    /// Capture the ambient context visible on the calling task right now.
    pub fn capture() -> Self {
        Self { action_id: ActionContext::current(), stage: StageContext::current() }
    }

    /// Re-establish this snapshot's ambient context for the duration of `fut`.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        match (self.action_id, self.stage) {
            (Some(action_id), Some((index, name))) => {
                ActionContext::scope(action_id, StageContext::scope(index, name, fut)).await
            }
            (Some(action_id), None) => ActionContext::scope(action_id, fut).await,
            (None, _) => fut.await,
        }
    }
}
