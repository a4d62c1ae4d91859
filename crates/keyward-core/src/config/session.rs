//! Session management configuration.

use serde::{Deserialize, Serialize};

/// Session lifetime and cleanup configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Absolute session lifetime in days.
    #[serde(default = "default_ttl_days")]
    pub ttl_days: u64,
    /// Interval for expired session cleanup in minutes.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_days: default_ttl_days(),
            cleanup_interval_minutes: default_cleanup_interval(),
        }
    }
}

fn default_ttl_days() -> u64 {
    7
}

fn default_cleanup_interval() -> u64 {
    15
}
