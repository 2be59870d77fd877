// File: tablepoints-common/src/models/mod.rs
pub mod balance;
pub mod transaction;
pub mod expiration;
pub mod level;
pub mod rule;
pub mod reward;
pub mod anomaly;
pub mod events;

pub use balance::{PointsBalance, PointsOverview};
pub use transaction::{NewPointsTransaction, PointsTransaction, SourceType, TransactionType};
pub use expiration::{ExpirationStatus, ExpiringPoints, PointsExpiration};
pub use level::{DiscountType, LevelProgress, MemberLevel};
pub use rule::{
    ExpirationConfig, OrderEarnConfig, PointsRule, PointsUsageConfig, ReviewEarnConfig,
    RuleConfig, RuleKey, RuleSnapshot, RuleType,
};
pub use reward::{RedeemedReward, RedemptionResult, RedemptionStatus, Reward, UnfreezeReason};
pub use anomaly::{Anomaly, AnomalyScanParams, AnomalyType, Severity};
pub use events::{OrderPaid, ReviewApproved, SpendValidation};
