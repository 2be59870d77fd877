// File: tablepoints-common/src/models/expiration.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpirationStatus {
    Pending,
    Expired,
    Cancelled,
}

impl fmt::Display for ExpirationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpirationStatus::Pending => write!(f, "pending"),
            ExpirationStatus::Expired => write!(f, "expired"),
            ExpirationStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for ExpirationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ExpirationStatus::Pending),
            "expired" => Ok(ExpirationStatus::Expired),
            "cancelled" => Ok(ExpirationStatus::Cancelled),
            _ => Err(format!("Unknown expiration status: {}", s)),
        }
    }
}

/// Future expiry of one earn transaction. Only `status`, `points` and
/// `processed_at` change after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsExpiration {
    pub expiration_id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Uuid,
    pub points: i64,
    pub expire_at: DateTime<Utc>,
    pub status: ExpirationStatus,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Read-only projection for "points expiring soon" displays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpiringPoints {
    pub points: i64,
    pub expire_at: DateTime<Utc>,
    pub days_left: i64,
}
