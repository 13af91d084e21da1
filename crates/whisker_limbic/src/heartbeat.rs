//! Heartbeat configuration for the mood loop
//!
//! The heartbeat determines how often satiety and pet scales are recomputed
//! from history, even when nobody is interacting with the cat.

use std::time::Duration;
use whisker_core::CatConfig;

/// Configuration for the mood heartbeat
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// How often to recompute the mood (default: 1s)
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

impl HeartbeatConfig {
    /// Very fast heartbeat for testing
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
        }
    }
}

impl From<&CatConfig> for HeartbeatConfig {
    fn from(config: &CatConfig) -> Self {
        Self {
            interval: config.tick_interval(),
        }
    }
}
