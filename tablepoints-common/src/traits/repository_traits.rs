// File: tablepoints-common/src/traits/repository_traits.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    MemberLevel, NewPointsTransaction, PointsBalance, PointsExpiration, PointsRule,
    PointsTransaction, RedeemedReward, Reward, RuleKey, SourceType, TransactionType,
};

/// Everything that happens to one user's points while their balance row is
/// locked. Obtained from [`PointsRepository::begin`]; the lock is held until
/// `commit` or drop. Dropping without `commit` discards every write.
#[async_trait]
pub trait PointsUnitOfWork: Send {
    fn balance(&self) -> &PointsBalance;
    fn balance_mut(&mut self) -> &mut PointsBalance;

    /// Looks up a transaction of the locked user, including ones appended
    /// earlier in this unit of work. Only rows of `tx_type` match.
    async fn find_transaction(
        &mut self,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error>;

    async fn append_transaction(&mut self, tx: NewPointsTransaction) -> Result<PointsTransaction, Error>;

    async fn insert_expiration(&mut self, expiration: &PointsExpiration) -> Result<(), Error>;
    async fn get_expiration(&mut self, expiration_id: Uuid) -> Result<Option<PointsExpiration>, Error>;
    async fn update_expiration(&mut self, expiration: &PointsExpiration) -> Result<(), Error>;

    /// Takes one unit of stock. `false` when the reward is inactive or sold out.
    async fn decrement_reward_stock(&mut self, reward_id: Uuid) -> Result<bool, Error>;

    async fn insert_redemption(&mut self, redemption: &RedeemedReward) -> Result<(), Error>;
    async fn get_redemption(&mut self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error>;
    async fn update_redemption(&mut self, redemption: &RedeemedReward) -> Result<(), Error>;

    /// Persists the (possibly modified) balance and every staged write.
    async fn commit(self: Box<Self>) -> Result<(), Error>;
}

#[async_trait]
pub trait PointsRepository: Send + Sync {
    /// Locks the user's balance row, creating it at `default_level` when absent.
    async fn begin(&self, user_id: Uuid, default_level: &str) -> Result<Box<dyn PointsUnitOfWork>, Error>;

    async fn get_balance(&self, user_id: Uuid) -> Result<Option<PointsBalance>, Error>;

    /// Only rows of `tx_type` match.
    async fn find_transaction(
        &self,
        user_id: Uuid,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error>;

    /// Newest first.
    async fn list_transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointsTransaction>, Error>;

    /// Pending records with `expire_at <= now`, oldest first.
    async fn list_due_expirations(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<PointsExpiration>, Error>;

    /// Pending records of one user expiring at or before `until`, soonest first.
    async fn list_pending_expirations(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<Vec<PointsExpiration>, Error>;

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error>;

    /// Unused redemptions whose `expire_at <= now`.
    async fn list_lapsed_redemptions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RedeemedReward>, Error>;
}

#[async_trait]
pub trait LevelRepository: Send + Sync {
    async fn list_levels(&self) -> Result<Vec<MemberLevel>, Error>;
    async fn upsert_level(&self, level: &MemberLevel) -> Result<(), Error>;
    async fn delete_level(&self, level_id: Uuid) -> Result<(), Error>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn get_rule(&self, key: RuleKey) -> Result<Option<PointsRule>, Error>;
    async fn list_rules(&self) -> Result<Vec<PointsRule>, Error>;
    async fn upsert_rule(&self, rule: &PointsRule) -> Result<(), Error>;
}

#[async_trait]
pub trait RewardRepository: Send + Sync {
    async fn create_reward(&self, reward: &Reward) -> Result<(), Error>;
    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, Error>;
    async fn list_rewards(&self) -> Result<Vec<Reward>, Error>;
    async fn update_reward(&self, reward: &Reward) -> Result<(), Error>;
}

/// Read-only aggregate queries backing the anomaly detector. Every window
/// is `since <= created_at <= until`.
#[async_trait]
pub trait PointsAnalyticsRepository: Send + Sync {
    /// Earn transactions in the window with `points > threshold`.
    async fn earn_transactions_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, threshold: i64) -> Result<Vec<PointsTransaction>, Error>;

    /// (user, count) for users with more than `max_count` transactions in the window.
    async fn transaction_counts_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, max_count: i64) -> Result<Vec<(Uuid, i64)>, Error>;

    /// (user, earned) for users who earned more than `max_total` in the window.
    async fn earn_totals_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, max_total: i64) -> Result<Vec<(Uuid, i64)>, Error>;

    /// Rows where `available + frozen > total`.
    async fn balances_violating_invariant(&self) -> Result<Vec<PointsBalance>, Error>;

    /// Sum of `|points|` of one transaction type in the window.
    async fn sum_points(&self, tx_type: TransactionType, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<i64, Error>;
}
