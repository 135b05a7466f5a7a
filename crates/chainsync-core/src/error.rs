//! Error types for the sync dispatcher.

use thiserror::Error;

/// Errors returned by the target queue and the dispatcher.
///
/// Every variant is a caller contract violation rather than a normal
/// runtime condition. None of them leave the queue or the dedup set in a
/// partially updated state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The pushed target failed structural expectations.
    #[error("invalid sync target pushed to the target queue: {reason}")]
    InvalidPush { reason: String },

    /// `pop` was called without first checking that the queue is non-empty.
    #[error("target queue popped while empty; check len() before popping")]
    EmptyPop,

    /// The queue has reached its configured maximum length.
    #[error("target queue is full ({capacity} targets)")]
    QueueFull { capacity: usize },
}

impl DispatchError {
    /// Returns `true` if the error comes from misusing the queue API
    /// (as opposed to hitting a configured bound).
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::InvalidPush { .. } | Self::EmptyPop)
    }
}

/// Error reported by a [`SyncHandler`](crate::worker::SyncHandler) when a
/// sync job for a target fails.
#[derive(Debug, Error)]
pub enum SyncJobError {
    #[error("failed to fetch blocks for {head}: {reason}")]
    Fetch { head: String, reason: String },

    #[error("chain validation failed for {head}: {reason}")]
    Validation { head: String, reason: String },

    #[error("{0}")]
    Other(String),
}
