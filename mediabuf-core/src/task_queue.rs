//! Cancellable FIFO of deferred work
//!
//! Append and remove return to the caller immediately; the work they schedule
//! sits in a [`TaskQueue`] until the host's event loop drains it. Scheduled
//! entries can be cancelled by handle until they are popped.

use std::collections::VecDeque;

/// Handle identifying a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

/// FIFO of pending tasks with cancellable entries
#[derive(Debug)]
pub struct TaskQueue<T> {
    pending: VecDeque<(TaskHandle, T)>,
    next_handle: u64,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            next_handle: 0,
        }
    }
}

impl<T> TaskQueue<T> {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a task behind everything already queued
    pub fn schedule(&mut self, task: T) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;
        self.pending.push_back((handle, task));
        handle
    }

    /// Cancel a task that has not started yet
    ///
    /// Returns the task if it was still pending.
    pub fn cancel(&mut self, handle: TaskHandle) -> Option<T> {
        let position = self.pending.iter().position(|(queued, _)| *queued == handle)?;
        self.pending.remove(position).map(|(_, task)| task)
    }

    /// Take the oldest pending task
    pub fn pop(&mut self) -> Option<(TaskHandle, T)> {
        self.pending.pop_front()
    }

    /// Whether the task is still pending
    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.pending.iter().any(|(queued, _)| *queued == handle)
    }

    /// Number of pending tasks
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every pending task
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
