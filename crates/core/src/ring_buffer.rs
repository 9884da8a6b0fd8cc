// SPDX-License-Identifier: MIT

//! Bounded FIFO used for a MasterAction's recent log lines.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A ring buffer that keeps at most `capacity` most-recent items.
///
/// Used for `MasterAction::recent_logs`: UIs and status views only need a
/// recent tail, not the full history (that lives in the Journal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingBuffer<T> {
    capacity: usize,
    items: VecDeque<T>,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        Self { capacity, items: VecDeque::with_capacity(capacity) }
    }

    /// Push a new item, evicting the oldest if at capacity.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn as_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.iter().cloned().collect()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new(100)
    }
}

#[cfg(test)]
#[path = "ring_buffer_tests.rs"]
mod tests;
