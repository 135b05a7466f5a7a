//! Dispatcher — the intake gate between chain head announcements and the
//! sync worker.
//!
//! Announcements arrive concurrently from hello handshakes, the local miner
//! and gossip. All three entry points fold into one acceptance procedure:
//! heads already being tracked are dropped, everything else becomes a
//! [`SyncTarget`] on a height-ordered [`TargetQueue`].
//!
//! The dedup set and the queue are one logical resource and live behind a
//! single lock. A key is only recorded after the push succeeded, so the
//! two never disagree, even when a push is rejected.
//!
//! A head stays tracked from acceptance until the sync worker calls
//! [`Dispatcher::complete`] for it:
//!
//! ```text
//! receive_* ──► queued ──pop──► in flight ──complete──► untracked
//!     ▲                                                     │
//!     └──────────────── may be accepted again ◄─────────────┘
//! ```

use std::collections::HashSet;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use crate::config::DispatcherConfig;
use crate::error::DispatchError;
use crate::queue::TargetQueue;
use crate::types::{ChainInfo, ChainOrigin, SyncTarget, TipsetKey};

/// Accepted-target counts per entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginCounts {
    pub hello: u64,
    pub own_block: u64,
    pub gossip: u64,
}

impl OriginCounts {
    fn bump(&mut self, origin: ChainOrigin) {
        match origin {
            ChainOrigin::Hello => self.hello += 1,
            ChainOrigin::OwnBlock => self.own_block += 1,
            ChainOrigin::Gossip => self.gossip += 1,
        }
    }
}

/// Counters snapshot for the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherStats {
    /// Announcements turned into queued targets.
    pub accepted: u64,
    /// Announcements dropped because their head was already tracked.
    pub duplicates: u64,
    /// Announcements whose push failed.
    pub rejected: u64,
    /// Targets handed to a consumer.
    pub popped: u64,
    /// Heads released via [`Dispatcher::complete`].
    pub completed: u64,
    /// `accepted`, split by entry point.
    pub accepted_by_origin: OriginCounts,
}

/// State guarded by the dispatcher lock.
struct Targeting {
    /// Canonical keys of every tracked head (queued or in flight).
    tracked: HashSet<String>,
    /// Keys popped by a consumer and not yet completed.
    in_flight: HashSet<String>,
    queue: TargetQueue,
    stats: DispatcherStats,
}

/// Deduplicating, height-prioritized intake for sync targets.
///
/// Share it between producers and the sync worker with `Arc<Dispatcher>`.
pub struct Dispatcher {
    targeting: Mutex<Targeting>,
    /// Woken whenever a target is queued.
    queued: Notify,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a dispatcher with the default configuration.
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        let queue = TargetQueue::with_capacity(config.initial_capacity, config.max_queued);
        Self {
            targeting: Mutex::new(Targeting {
                tracked: HashSet::new(),
                in_flight: HashSet::new(),
                queue,
                stats: DispatcherStats::default(),
            }),
            queued: Notify::new(),
            config,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    // ─── Ingestion ────────────────────────────────────────────────────────────

    /// Handle chain info from a bootstrap peer's hello handshake.
    pub fn receive_hello(&self, ci: ChainInfo) -> Result<(), DispatchError> {
        self.receive(ci, ChainOrigin::Hello)
    }

    /// Handle chain info from the node's own mining.
    pub fn receive_own_block(&self, ci: ChainInfo) -> Result<(), DispatchError> {
        self.receive(ci, ChainOrigin::OwnBlock)
    }

    /// Handle chain info from a block propagated over gossip.
    pub fn receive_gossip_block(&self, ci: ChainInfo) -> Result<(), DispatchError> {
        self.receive(ci, ChainOrigin::Gossip)
    }

    fn receive(&self, ci: ChainInfo, via: ChainOrigin) -> Result<(), DispatchError> {
        let key = ci.head.to_string();
        let height = ci.height;

        {
            let mut t = self.targeting.lock();

            if t.tracked.contains(&key) {
                // Already tracking: first announcement wins, even at a different height.
                t.stats.duplicates += 1;
                tracing::trace!(head = %key, height, origin = %via, "Dropping already tracked head");
                return Ok(());
            }

            if let Err(e) = t.queue.push(SyncTarget::new(ci)) {
                t.stats.rejected += 1;
                tracing::warn!(head = %key, height, origin = %via, error = %e, "Sync target rejected");
                return Err(e);
            }

            t.tracked.insert(key.clone());
            t.stats.accepted += 1;
            t.stats.accepted_by_origin.bump(via);
            tracing::debug!(head = %key, height, origin = %via, queued = t.queue.len(), "Sync target accepted");
        }

        self.queued.notify_waiters();
        Ok(())
    }

    // ─── Consumption ──────────────────────────────────────────────────────────

    /// Number of queued targets.
    pub fn len(&self) -> usize {
        self.targeting.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targeting.lock().queue.is_empty()
    }

    /// Remove and return the highest target.
    ///
    /// Returns [`DispatchError::EmptyPop`] if nothing is queued. The popped
    /// head stays tracked until [`complete`](Self::complete) is called.
    pub fn pop(&self) -> Result<SyncTarget, DispatchError> {
        let mut t = self.targeting.lock();
        let target = t.queue.pop()?;
        Self::mark_in_flight(&mut t, &target);
        Ok(target)
    }

    /// Length check and pop as one step.
    pub fn try_pop(&self) -> Option<SyncTarget> {
        let mut t = self.targeting.lock();
        let target = t.queue.pop().ok()?;
        Self::mark_in_flight(&mut t, &target);
        Some(target)
    }

    /// Pop every queued target in priority order.
    pub fn drain(&self) -> Vec<SyncTarget> {
        let mut t = self.targeting.lock();
        let targets = t.queue.drain_ordered();
        for target in &targets {
            Self::mark_in_flight(&mut t, target);
        }
        targets
    }

    fn mark_in_flight(t: &mut Targeting, target: &SyncTarget) {
        t.in_flight.insert(target.head().to_string());
        t.stats.popped += 1;
    }

    /// Height of the next target, if any.
    pub fn peek_height(&self) -> Option<u64> {
        self.targeting.lock().queue.peek().map(SyncTarget::height)
    }

    /// Wait until at least one target is queued.
    pub async fn wait_for_target(&self) {
        loop {
            let notified = self.queued.notified();
            tokio::pin!(notified);
            // Register before checking so a push in between is not missed.
            notified.as_mut().enable();
            if !self.is_empty() {
                return;
            }
            notified.await;
        }
    }

    // ─── Tracking ─────────────────────────────────────────────────────────────

    /// Returns `true` if `head` is queued or in flight.
    pub fn is_tracking(&self, head: &TipsetKey) -> bool {
        self.targeting.lock().tracked.contains(&head.to_string())
    }

    /// Number of tracked heads (queued + in flight).
    pub fn tracked_len(&self) -> usize {
        self.targeting.lock().tracked.len()
    }

    /// Number of popped heads not yet completed.
    pub fn in_flight_len(&self) -> usize {
        self.targeting.lock().in_flight.len()
    }

    /// Release a head the sync worker has finished with, so a later
    /// announcement of it is accepted again.
    ///
    /// Returns `false` if `head` was not in flight. A head that is still
    /// queued cannot be completed.
    pub fn complete(&self, head: &TipsetKey) -> bool {
        let key = head.to_string();
        let mut t = self.targeting.lock();
        if !t.in_flight.remove(&key) {
            return false;
        }
        t.tracked.remove(&key);
        t.stats.completed += 1;
        tracing::debug!(head = %key, "Sync target completed");
        true
    }

    /// Counters snapshot.
    pub fn stats(&self) -> DispatcherStats {
        self.targeting.lock().stats.clone()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.targeting.lock();
        f.debug_struct("Dispatcher")
            .field("queued", &t.queue.len())
            .field("tracked", &t.tracked.len())
            .field("in_flight", &t.in_flight.len())
            .finish()
    }
}
