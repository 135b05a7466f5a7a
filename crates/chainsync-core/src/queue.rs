//! Target queue — orders sync targets by claimed chain height and reports
//! misuse as [`DispatchError`] values instead of panicking.
//!
//! Callers should check [`TargetQueue::len`] before popping.

use crate::error::DispatchError;
use crate::heap::TargetHeap;
use crate::types::SyncTarget;

/// Priority queue of sync targets, highest claimed height first.
///
/// Not thread-safe on its own; the [`Dispatcher`](crate::Dispatcher) owns
/// it behind the same lock as its dedup set.
pub struct TargetQueue {
    heap: TargetHeap,
    /// Maximum number of queued targets. `None` = unbounded.
    max_len: Option<usize>,
}

impl TargetQueue {
    /// Create an empty, unbounded queue.
    pub fn new() -> Self {
        Self {
            heap: TargetHeap::new(),
            max_len: None,
        }
    }

    /// Create a queue with pre-allocated storage and an optional length bound.
    pub fn with_capacity(initial: usize, max_len: Option<usize>) -> Self {
        Self {
            heap: TargetHeap::with_capacity(initial),
            max_len,
        }
    }

    /// Add a sync target.
    ///
    /// Fails with [`DispatchError::InvalidPush`] if the target's tipset key is
    /// empty or malformed, and with [`DispatchError::QueueFull`] if the queue
    /// is at its configured bound. The queue is unchanged on failure.
    pub fn push(&mut self, target: SyncTarget) -> Result<(), DispatchError> {
        let head = target.head();
        if head.is_empty() {
            return Err(DispatchError::InvalidPush {
                reason: "sync target has an empty tipset key".into(),
            });
        }
        if !head.is_well_formed() {
            return Err(DispatchError::InvalidPush {
                reason: format!("malformed tipset key {head}: CIDs must be non-empty and comma-free"),
            });
        }
        if let Some(capacity) = self.max_len {
            if self.heap.len() >= capacity {
                return Err(DispatchError::QueueFull { capacity });
            }
        }
        self.heap.push(target);
        Ok(())
    }

    /// Remove and return the highest priority sync target.
    pub fn pop(&mut self) -> Result<SyncTarget, DispatchError> {
        self.heap.pop().ok_or(DispatchError::EmptyPop)
    }

    /// The next target `pop` would return.
    pub fn peek(&self) -> Option<&SyncTarget> {
        self.heap.peek()
    }

    /// Number of queued targets.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Pop every queued target in priority order.
    pub fn drain_ordered(&mut self) -> Vec<SyncTarget> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(target) = self.heap.pop() {
            out.push(target);
        }
        out
    }
}

impl Default for TargetQueue {
    fn default() -> Self {
        Self::new()
    }
}
