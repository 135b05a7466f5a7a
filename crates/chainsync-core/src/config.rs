//! Dispatcher and logging configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Storage pre-allocated for queued targets.
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Maximum number of queued targets (`None` = unbounded).
    /// Announcements arriving while the queue is full are rejected.
    #[serde(default)]
    pub max_queued: Option<usize>,
}

fn default_initial_capacity() -> usize { 64 }

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            max_queued: None,
        }
    }
}

/// Logging settings for the dispatcher and its worker.
///
/// Accept/drop decisions log at `debug`/`trace` under `chainsync_core`, so
/// a quiet global level with `chainsync-core: debug` shows intake traffic only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level for every crate without an override.
    #[serde(default = "default_level")]
    pub level: String,
    /// Crate name (dashes allowed, e.g. `chainsync-core`) → level.
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// One JSON object per event instead of plain text lines.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directives: the global level, then overrides sorted by
    /// crate, e.g. `"warn,chainsync_cli=info,chainsync_core=debug"`.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainsyncConfig {
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    #[serde(default)]
    pub log: LogConfig,
}
