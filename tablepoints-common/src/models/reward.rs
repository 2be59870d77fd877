// File: tablepoints-common/src/models/reward.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::balance::PointsBalance;
use crate::models::transaction::PointsTransaction;

/// A coupon or gift that can be bought with points. Stock is owned by the
/// coupon subsystem; the redemption flow only decrements it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reward {
    pub reward_id: Uuid,
    pub name: String,
    pub points_cost: i64,
    pub stock: i32,
    pub is_active: bool,
    /// How long a redeemed instance stays usable.
    pub valid_days: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn new(name: &str, points_cost: i64, stock: i32, valid_days: i64) -> Self {
        let now = Utc::now();
        Self {
            reward_id: Uuid::new_v4(),
            name: name.to_string(),
            points_cost,
            stock,
            is_active: true,
            valid_days,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_redeemable(&self) -> bool {
        self.is_active && self.stock > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Unused,
    Used,
    Expired,
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedemptionStatus::Unused => write!(f, "unused"),
            RedemptionStatus::Used => write!(f, "used"),
            RedemptionStatus::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for RedemptionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unused" => Ok(RedemptionStatus::Unused),
            "used" => Ok(RedemptionStatus::Used),
            "expired" => Ok(RedemptionStatus::Expired),
            _ => Err(format!("Unknown redemption status: {}", s)),
        }
    }
}

/// Why frozen points are being released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfreezeReason {
    /// Reward consumed: the frozen amount is discarded.
    Used,
    /// Reward lapsed: the frozen amount returns to `available_points`.
    Expired,
}

/// The redeemable instance handed to the user after a redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemedReward {
    pub redemption_id: Uuid,
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub points: i64,
    pub code: String,
    pub status: RedemptionStatus,
    pub idempotency_key: String,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionResult {
    pub transaction: PointsTransaction,
    pub redemption: RedeemedReward,
    pub balance: PointsBalance,
}
