//! chainsync-core — intake and prioritization of chain sync targets.
//!
//! # Architecture
//!
//! ```text
//! hello / own block / gossip
//!            │ ChainInfo
//!            ▼
//!       Dispatcher ──── dedup set ┐ one lock
//!            │          TargetQueue ┘
//!            │              └── TargetHeap (arena-indexed max-heap by height)
//!            ▼ SyncTarget
//!       SyncWorker ──► SyncHandler (the actual sync job) ──► Dispatcher::complete
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod heap;
pub mod queue;
pub mod types;
pub mod worker;

pub use config::{ChainsyncConfig, DispatcherConfig, LogConfig};
pub use dispatcher::{Dispatcher, DispatcherStats, OriginCounts};
pub use error::{DispatchError, SyncJobError};
pub use heap::TargetHeap;
pub use queue::TargetQueue;
pub use types::{ChainInfo, ChainOrigin, SyncTarget, TipsetKey};
pub use worker::{SyncHandler, SyncWorker, WorkerReport};
