//! Sync worker — drains the dispatcher one target at a time.
//!
//! The actual sync job (fetching blocks, validating, extending state) is
//! supplied by the caller through [`SyncHandler`]. The worker's job is the
//! dispatcher contract: pop the best target, run the job, then release the
//! head with [`Dispatcher::complete`] whether the job succeeded or not.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::dispatcher::Dispatcher;
use crate::error::SyncJobError;
use crate::types::SyncTarget;

/// Runs the sync job for one target.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    async fn sync(&self, target: &SyncTarget) -> Result<(), SyncJobError>;
}

/// Outcome counts for a [`SyncWorker`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerReport {
    pub synced: u64,
    pub failed: u64,
}

impl WorkerReport {
    pub fn processed(&self) -> u64 {
        self.synced + self.failed
    }
}

/// Sequential consumer of a shared [`Dispatcher`].
pub struct SyncWorker {
    dispatcher: Arc<Dispatcher>,
    handler: Arc<dyn SyncHandler>,
}

impl SyncWorker {
    pub fn new(dispatcher: Arc<Dispatcher>, handler: Arc<dyn SyncHandler>) -> Self {
        Self { dispatcher, handler }
    }

    /// Sync targets until `shutdown` resolves.
    ///
    /// A job in progress when `shutdown` fires runs to completion first.
    pub async fn run_until<F>(&self, shutdown: F) -> WorkerReport
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut report = WorkerReport::default();
        tracing::info!("Sync worker started");

        loop {
            // Shutdown is checked before every pop, not only when the queue runs dry.
            let target = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                target = self.next_target() => target,
            };
            self.process(&target, &mut report).await;
            // Let the timer driver and other tasks run between back-to-back jobs.
            tokio::task::yield_now().await;
        }

        tracing::info!(synced = report.synced, failed = report.failed, "Sync worker stopped");
        report
    }

    /// Sync whatever is queued right now, then return.
    pub async fn run_once(&self) -> WorkerReport {
        let mut report = WorkerReport::default();
        while let Some(target) = self.dispatcher.try_pop() {
            self.process(&target, &mut report).await;
        }
        report
    }

    /// Pop the best target, waiting for one if the queue is empty.
    async fn next_target(&self) -> SyncTarget {
        loop {
            if let Some(target) = self.dispatcher.try_pop() {
                return target;
            }
            self.dispatcher.wait_for_target().await;
        }
    }

    async fn process(&self, target: &SyncTarget, report: &mut WorkerReport) {
        let head = target.head();
        match self.handler.sync(target).await {
            Ok(()) => {
                report.synced += 1;
                tracing::debug!(head = %head, height = target.height(), "Sync target synced");
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(head = %head, height = target.height(), error = %e, "Sync job failed");
            }
        }
        self.dispatcher.complete(head);
    }
}
