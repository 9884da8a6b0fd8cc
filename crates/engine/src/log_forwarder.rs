// SPDX-License-Identifier: MIT

//! LogForwarder (C6): an ordered asynchronous queue target that tags
//! master-side log events with ambient action/stage ids and dispatches
//! each to both the UINotifier and the Journal, with a flush barrier
//! (spec.md §4.6).

use crate::context::{ActionContext, StageContext};
use fleet_core::Clock;
use fleet_journal::Journal;
use fleet_wire::{LogLevel, UiEvent, UiNotifier};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

/// One master-side log line, queued before it is resolved against ambient
/// context at consume time.
struct LogEvent {
    level: LogLevel,
    message: String,
}

enum Item {
    Log(LogEvent),
    /// A flush barrier: completed only after every prior item has been
    /// fully processed.
    Flush(oneshot::Sender<()>),
}

/// Single-reader FIFO of log events and flush markers (spec.md §4.6).
///
/// The producer side (`log`/`flush`) is cheap and non-blocking — it only
/// pushes onto an unbounded channel — so any code path holding a lock or
/// mid-aggregation can emit a log line without awaiting I/O.
pub struct LogForwarder<C: Clock> {
    clock: C,
    journal: Arc<Journal>,
    ui: Arc<dyn UiNotifier>,
    tx: mpsc::UnboundedSender<Item>,
}

impl<C: Clock> LogForwarder<C> {
    /// Construct the forwarder and spawn its single consumer loop. The
    /// returned handle can be cloned cheaply (its sender is an
    /// `mpsc::UnboundedSender`); the consumer task runs until every clone's
    /// sender half is dropped.
    pub fn spawn(clock: C, journal: Arc<Journal>, ui: Arc<dyn UiNotifier>) -> Arc<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Item>();
        let forwarder = Arc::new(Self { clock, journal, ui, tx });
        let journal_for_loop = forwarder.journal.clone();
        let ui_for_loop = forwarder.ui.clone();

        let clock_for_loop = forwarder.clock.clone();
        tokio::spawn(async move {
            while let Some(item) = rx.recv().await {
                match item {
                    Item::Log(event) => {
                        forward_one(&journal_for_loop, &ui_for_loop, clock_for_loop.epoch_ms(), event).await;
                    }
                    Item::Flush(done) => {
                        // Completing after draining everything queued before this
                        // marker gives callers a strict barrier (spec.md §4.6).
                        let _ = done.send(());
                    }
                }
            }
        });

        forwarder
    }

    /// Queue a master-side log line, tagged with whatever ambient
    /// MasterActionId/stage is established on the calling task. Silently
    /// dropped (per spec.md §4.6) if no ambient MasterActionId is set —
    /// there is nowhere to route it.
    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        let _ = self.tx.send(Item::Log(LogEvent { level, message: message.into() }));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    /// Block until every event queued before this call has been processed.
    /// Used by the Dispatcher's end-of-stage barrier and the Coordinator's
    /// finally-block flush (spec.md §4.6, §5).
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.tx.send(Item::Flush(tx)).is_err() {
            // Consumer loop is gone (all senders dropped elsewhere); there is
            // nothing left to drain, so the barrier is trivially satisfied.
            return;
        }
        let _ = rx.await;
    }
}

async fn forward_one(journal: &Journal, ui: &Arc<dyn UiNotifier>, now_epoch_ms: u64, event: LogEvent) {
    let Some(action_id) = ActionContext::current() else {
        tracing::warn!(message = %event.message, "master log dropped: no ambient MasterActionId");
        return;
    };
    let Some((stage_index, stage_name)) = StageContext::current() else {
        tracing::warn!(%action_id, message = %event.message, "master log dropped: no ambient stage");
        return;
    };

    ui.publish(UiEvent::OperationLogEntry {
        action_id: action_id.clone(),
        node_name: "_master".to_string(),
        message: event.message.clone(),
    })
    .await;

    let line = format!("{} [{}] {}\n", fleet_wire::format_timestamp(now_epoch_ms), event.level, event.message);
    journal.append_master_log_to_stage(&action_id, stage_index, &stage_name, &line).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ActionContext, StageContext};
    use fleet_core::FakeClock;
    use fleet_wire::FakeUiNotifier;
    use std::time::Duration;

    fn journal(dir: &tempfile::TempDir) -> Arc<Journal> {
        Arc::new(Journal::new(dir.path(), "env"))
    }

    #[tokio::test]
    async fn log_without_ambient_context_is_dropped_not_panicking() {
        let dir = tempfile::tempdir().expect("tmp");
        let ui = Arc::new(FakeUiNotifier::new());
        let forwarder = LogForwarder::spawn(FakeClock::new(), journal(&dir), ui.clone());
        forwarder.info("stray line");
        forwarder.flush().await;
        assert!(ui.events().is_empty());
    }

    #[tokio::test]
    async fn log_within_ambient_context_reaches_ui_and_journal() {
        let dir = tempfile::tempdir().expect("tmp");
        let j = journal(&dir);
        let ui = Arc::new(FakeUiNotifier::new());
        let forwarder = LogForwarder::spawn(FakeClock::new(), j.clone(), ui.clone());

        let action = fleet_core::MasterAction::new(fleet_core::OperationType::VerifyEnvironment, "tester", Default::default(), 0);
        j.record_action_initiated(&action).await;
        let stage = fleet_core::Stage::new(0, "verify", None, 0);
        j.record_stage_initiated(&action.id, &stage).await;

        let action_id = action.id.clone();
        ActionContext::scope(action_id.clone(), async {
            StageContext::scope(0, "verify", async {
                forwarder.info("hello from master");
                forwarder.flush().await;
            })
            .await
        })
        .await;

        assert_eq!(ui.events().len(), 1);
        let action_dir = j.active_action_dir(&action_id).expect("active");
        let stage_dir = fleet_journal::EnvironmentLayout::stage_dir(&action_dir, 0, "verify");
        let log_path = fleet_journal::EnvironmentLayout::master_log_file(&stage_dir);
        let contents = tokio::fs::read_to_string(&log_path).await.expect("master log");
        assert!(contents.contains("hello from master"));
    }

    #[tokio::test]
    async fn flush_waits_for_prior_events_to_drain() {
        let dir = tempfile::tempdir().expect("tmp");
        let j = journal(&dir);
        let ui = Arc::new(FakeUiNotifier::new());
        let forwarder = LogForwarder::spawn(FakeClock::new(), j.clone(), ui.clone());

        let action = fleet_core::MasterAction::new(fleet_core::OperationType::VerifyEnvironment, "tester", Default::default(), 0);
        j.record_action_initiated(&action).await;
        let stage = fleet_core::Stage::new(0, "verify", None, 0);
        j.record_stage_initiated(&action.id, &stage).await;

        ActionContext::scope(action.id.clone(), async {
            StageContext::scope(0, "verify", async {
                for i in 0..50 {
                    forwarder.info(format!("line {i}"));
                }
                forwarder.flush().await;
            })
            .await
        })
        .await;

        assert_eq!(ui.events().len(), 50);
    }

    #[tokio::test]
    async fn log_line_timestamp_comes_from_the_injected_clock() {
        let dir = tempfile::tempdir().expect("tmp");
        let j = journal(&dir);
        let ui = Arc::new(FakeUiNotifier::new());
        let clock = FakeClock::new();
        clock.advance(Duration::from_secs(3600));
        let forwarder = LogForwarder::spawn(clock.clone(), j.clone(), ui);

        let action = fleet_core::MasterAction::new(fleet_core::OperationType::VerifyEnvironment, "tester", Default::default(), 0);
        j.record_action_initiated(&action).await;
        let stage = fleet_core::Stage::new(0, "verify", None, 0);
        j.record_stage_initiated(&action.id, &stage).await;

        ActionContext::scope(action.id.clone(), async {
            StageContext::scope(0, "verify", async {
                forwarder.info("timestamped line");
                forwarder.flush().await;
            })
            .await
        })
        .await;

        let action_dir = j.active_action_dir(&action.id).expect("active");
        let stage_dir = fleet_journal::EnvironmentLayout::stage_dir(&action_dir, 0, "verify");
        let log_path = fleet_journal::EnvironmentLayout::master_log_file(&stage_dir);
        let contents = tokio::fs::read_to_string(&log_path).await.expect("master log");
        assert!(contents.starts_with(&fleet_wire::format_timestamp(clock.epoch_ms())));
    }
}
