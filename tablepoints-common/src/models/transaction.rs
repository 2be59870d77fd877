// File: tablepoints-common/src/models/transaction.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earn,
    Use,
    Redeem,
    Expire,
    Adjust,
    Consume,
}

impl TransactionType {
    /// Type recorded for a debit, keyed by what caused it.
    pub fn for_debit(source: SourceType) -> Self {
        match source {
            SourceType::Lottery => TransactionType::Consume,
            SourceType::Redeem => TransactionType::Redeem,
            SourceType::Expiration => TransactionType::Expire,
            SourceType::Admin => TransactionType::Adjust,
            _ => TransactionType::Use,
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionType::Earn => "earn",
            TransactionType::Use => "use",
            TransactionType::Redeem => "redeem",
            TransactionType::Expire => "expire",
            TransactionType::Adjust => "adjust",
            TransactionType::Consume => "consume",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransactionType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earn" => Ok(TransactionType::Earn),
            "use" => Ok(TransactionType::Use),
            "redeem" => Ok(TransactionType::Redeem),
            "expire" => Ok(TransactionType::Expire),
            "adjust" => Ok(TransactionType::Adjust),
            "consume" => Ok(TransactionType::Consume),
            _ => Err(format!("Unknown transaction type: {}", s)),
        }
    }
}

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Order,
    Review,
    ReviewAdoption,
    Lottery,
    Redeem,
    Expiration,
    Admin,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceType::Order => "order",
            SourceType::Review => "review",
            SourceType::ReviewAdoption => "review_adoption",
            SourceType::Lottery => "lottery",
            SourceType::Redeem => "redeem",
            SourceType::Expiration => "expiration",
            SourceType::Admin => "admin",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SourceType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "order" => Ok(SourceType::Order),
            "review" => Ok(SourceType::Review),
            "review_adoption" => Ok(SourceType::ReviewAdoption),
            "lottery" => Ok(SourceType::Lottery),
            "redeem" => Ok(SourceType::Redeem),
            "expiration" => Ok(SourceType::Expiration),
            "admin" => Ok(SourceType::Admin),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// Immutable ledger entry. Written once per balance mutation, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsTransaction {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    /// Signed delta applied to `available_points`.
    pub points: i64,
    /// `available_points` right after this entry was applied.
    pub balance_after: i64,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub description: Option<String>,
    pub expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload. The id is assigned when it is appended.
#[derive(Debug, Clone)]
pub struct NewPointsTransaction {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub points: i64,
    pub balance_after: i64,
    pub source_type: SourceType,
    pub source_id: Option<String>,
    pub description: Option<String>,
    pub expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NewPointsTransaction {
    pub fn into_transaction(self) -> PointsTransaction {
        PointsTransaction {
            transaction_id: Uuid::new_v4(),
            user_id: self.user_id,
            tx_type: self.tx_type,
            points: self.points,
            balance_after: self.balance_after,
            source_type: self.source_type,
            source_id: self.source_id,
            description: self.description,
            expire_at: self.expire_at,
            created_at: self.created_at,
        }
    }
}
