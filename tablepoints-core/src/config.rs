// tablepoints-core/src/config.rs

use std::time::Duration;
use serde::{Deserialize, Serialize};

use crate::engine::levels::DEFAULT_LEVEL_CODE;

/// Knobs of the points services themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsConfig {
    /// How long rule and level lookups are served from cache.
    pub cache_ttl_secs: i64,
    /// Records handled per query by the expiration sweep.
    pub sweep_batch_size: i64,
    /// Level assigned when the level table is empty.
    pub fallback_level_code: String,
}

impl Default for PointsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 300,
            sweep_batch_size: 500,
            fallback_level_code: DEFAULT_LEVEL_CODE.to_string(),
        }
    }
}

impl PointsConfig {
    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.max(0))
    }
}

/// Intervals of the background jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub expiration_interval_secs: u64,
    pub anomaly_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            expiration_interval_secs: 3600,
            anomaly_interval_secs: 6 * 3600,
        }
    }
}

impl SchedulerConfig {
    pub fn expiration_interval(&self) -> Duration {
        Duration::from_secs(self.expiration_interval_secs.max(1))
    }

    pub fn anomaly_interval(&self) -> Duration {
        Duration::from_secs(self.anomaly_interval_secs.max(1))
    }
}
