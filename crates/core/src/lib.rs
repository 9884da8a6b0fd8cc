// SPDX-License-Identifier: MIT

//! Data model shared by every component of the Master orchestration engine:
//! [`MasterAction`](action::MasterAction), [`Stage`](stage::Stage),
//! [`NodeAction`](node_action::NodeAction), [`NodeTask`](task::NodeTask),
//! [`NodeState`](node_state::NodeState), and
//! [`SystemChangeRecord`](change_record::SystemChangeRecord), plus the
//! small cross-cutting utilities (`Clock`, id generation, a bounded log
//! ring buffer) that every other crate in the workspace builds on.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

#[macro_use]
pub mod macros;

pub mod action;
pub mod change_record;
pub mod clock;
pub mod id;
pub mod node_action;
pub mod node_state;
pub mod params;
pub mod ring_buffer;
pub mod stage;
pub mod task;

pub use action::{MasterAction, MasterActionId, MasterActionStatus, OperationType};
pub use change_record::{ChangeId, ChangeOutcome, ChangeSource, FinalizeChangeInfo, InitiateChangeInfo, SystemChangeRecord};
pub use clock::{Clock, FakeClock, SystemClock};
pub use node_action::{NodeAction, NodeActionId};
pub use node_state::{ConnectivityStatus, NodeState};
pub use params::{parse_result_json, ParamMap};
pub use ring_buffer::RingBuffer;
pub use stage::{sanitize_path_segment, Stage};
pub use task::{NodeTask, NodeTaskId, NodeTaskStatus, TaskType};
