// File: tablepoints-common/src/models/balance.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::level::LevelProgress;

/// One row per user. `total_points` only ever grows; spending and expiry
/// reduce `available_points`, pending redemptions park points in
/// `frozen_points`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsBalance {
    pub user_id: Uuid,
    pub total_points: i64,
    pub available_points: i64,
    pub frozen_points: i64,
    pub level_code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PointsBalance {
    pub fn new(user_id: Uuid, level_code: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            total_points: 0,
            available_points: 0,
            frozen_points: 0,
            level_code: level_code.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// `available + frozen <= total`
    pub fn holds_invariant(&self) -> bool {
        self.available_points >= 0
            && self.frozen_points >= 0
            && self.available_points + self.frozen_points <= self.total_points
    }
}

/// What `get_points` hands back to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointsOverview {
    pub balance: PointsBalance,
    pub level_name: String,
    pub progress: LevelProgress,
}
