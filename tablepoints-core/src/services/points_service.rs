// File: tablepoints-core/src/services/points_service.rs

use std::sync::Arc;
use sqlx::{Pool, Postgres};
use tracing::debug;
use uuid::Uuid;

use tablepoints_common::models::{
    Anomaly, AnomalyScanParams, ExpiringPoints, OrderPaid, PointsBalance, PointsOverview,
    PointsTransaction, RedemptionResult, ReviewApproved, SourceType, SpendValidation,
    UnfreezeReason,
};

use crate::cache::{LevelStore, RuleStore};
use crate::config::PointsConfig;
use crate::engine::LevelTable;
use crate::repositories::{
    LevelRepository, MemoryPointsStore, PointsAnalyticsRepository, PointsRepository,
    PostgresLevelRepository, PostgresPointsAnalyticsRepository, PostgresPointsRepository,
    PostgresRewardRepository, PostgresRuleRepository, RewardRepository, RuleRepository,
};
use crate::services::anomaly_service::AnomalyDetector;
use crate::services::expiration_service::{ExpirationService, ExpirationSweepReport};
use crate::services::ledger_service::LedgerService;
use crate::services::redemption_service::RedemptionService;
use crate::Error;

/// The repositories a [`PointsService`] runs on.
#[derive(Clone)]
pub struct PointsBackends {
    pub points: Arc<dyn PointsRepository>,
    pub levels: Arc<dyn LevelRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub rewards: Arc<dyn RewardRepository>,
    pub analytics: Arc<dyn PointsAnalyticsRepository>,
}

impl PointsBackends {
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            points: Arc::new(PostgresPointsRepository::new(pool.clone())),
            levels: Arc::new(PostgresLevelRepository::new(pool.clone())),
            rules: Arc::new(PostgresRuleRepository::new(pool.clone())),
            rewards: Arc::new(PostgresRewardRepository::new(pool.clone())),
            analytics: Arc::new(PostgresPointsAnalyticsRepository::new(pool)),
        }
    }

    pub fn memory(store: &MemoryPointsStore) -> Self {
        Self {
            points: Arc::new(store.clone()),
            levels: Arc::new(store.clone()),
            rules: Arc::new(store.clone()),
            rewards: Arc::new(store.clone()),
            analytics: Arc::new(store.clone()),
        }
    }
}

/// Entry point for the rest of the platform: orders, reviews, coupons, the
/// lottery and the admin back office call in through here.
pub struct PointsService {
    ledger: Arc<LedgerService>,
    expirations: Arc<ExpirationService>,
    redemptions: Arc<RedemptionService>,
    anomalies: Arc<AnomalyDetector>,
    rules: Arc<RuleStore>,
    levels: Arc<LevelStore>,
    rewards: Arc<dyn RewardRepository>,
}

impl PointsService {
    pub fn new(backends: PointsBackends, config: &PointsConfig) -> Self {
        let rules = Arc::new(RuleStore::new(backends.rules.clone(), config.cache_ttl()));
        let levels = Arc::new(LevelStore::new(
            backends.levels.clone(),
            config.cache_ttl(),
            &config.fallback_level_code,
        ));
        let ledger = Arc::new(LedgerService::new(backends.points.clone(), levels.clone(), rules.clone()));
        let expirations = Arc::new(ExpirationService::new(
            backends.points.clone(),
            ledger.clone(),
            config.sweep_batch_size,
        ));
        let redemptions = Arc::new(RedemptionService::new(
            backends.points.clone(),
            backends.rewards.clone(),
            ledger.clone(),
            config.sweep_batch_size,
        ));
        let anomalies = Arc::new(AnomalyDetector::new(backends.analytics.clone()));

        Self {
            ledger,
            expirations,
            redemptions,
            anomalies,
            rules,
            levels,
            rewards: backends.rewards,
        }
    }

    pub fn ledger(&self) -> &Arc<LedgerService> {
        &self.ledger
    }

    pub fn expirations(&self) -> &Arc<ExpirationService> {
        &self.expirations
    }

    pub fn redemptions(&self) -> &Arc<RedemptionService> {
        &self.redemptions
    }

    pub fn rule_store(&self) -> &Arc<RuleStore> {
        &self.rules
    }

    pub fn level_store(&self) -> &Arc<LevelStore> {
        &self.levels
    }

    pub fn reward_repo(&self) -> &Arc<dyn RewardRepository> {
        &self.rewards
    }

    // ------------------------------------------------------------------
    // Accrual
    // ------------------------------------------------------------------

    /// Returns `None` when the order earns nothing or was already credited.
    pub async fn earn_points_from_order(&self, order: &OrderPaid) -> Result<Option<PointsTransaction>, Error> {
        let level = self.ledger.current_level(order.user_id).await?;
        let points = self.rules.engine().await.points_from_order(&level, order.amount);
        if points <= 0 {
            debug!("Order {} (amount {:.2}) earns no points", order.order_id, order.amount);
            return Ok(None);
        }
        let description = format!("Order {} paid", order.order_id);
        self.ledger
            .earn_unique(order.user_id, points, SourceType::Order, &order.order_id, Some(&description), None)
            .await
    }

    pub async fn earn_points_from_review(&self, review: &ReviewApproved) -> Result<Option<PointsTransaction>, Error> {
        let level = self.ledger.current_level(review.user_id).await?;
        let points = self
            .rules
            .engine()
            .await
            .points_from_review(&level, review.has_images, review.is_first_review);
        if points <= 0 {
            return Ok(None);
        }
        let description = format!("Review {} approved", review.review_id);
        self.ledger
            .earn_unique(review.user_id, points, SourceType::Review, &review.review_id, Some(&description), None)
            .await
    }

    pub async fn earn_points_from_adoption(&self, review: &ReviewApproved) -> Result<Option<PointsTransaction>, Error> {
        let level = self.ledger.current_level(review.user_id).await?;
        let points = self.rules.engine().await.points_from_adoption(&level);
        if points <= 0 {
            return Ok(None);
        }
        let description = format!("Review {} featured", review.review_id);
        self.ledger
            .earn_unique(
                review.user_id,
                points,
                SourceType::ReviewAdoption,
                &review.review_id,
                Some(&description),
                None,
            )
            .await
    }

    /// Credits points won elsewhere (e.g. a lottery prize).
    pub async fn award_points(
        &self,
        user_id: Uuid,
        points: i64,
        source_type: SourceType,
        source_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<PointsTransaction, Error> {
        self.ledger
            .earn(user_id, points, source_type, source_id, description, None)
            .await
    }

    // ------------------------------------------------------------------
    // Spending
    // ------------------------------------------------------------------

    pub async fn redeem_coupon(&self, user_id: Uuid, reward_id: Uuid, idempotency_key: &str) -> Result<RedemptionResult, Error> {
        self.redemptions.redeem(user_id, reward_id, idempotency_key).await
    }

    /// Spends points on a lottery draw.
    pub async fn consume_points(
        &self,
        user_id: Uuid,
        points: i64,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<PointsTransaction, Error> {
        self.ledger
            .debit(user_id, points, SourceType::Lottery, Some(source_id), description)
            .await
    }

    /// Pays part of an order with points.
    pub async fn use_points_for_order(&self, user_id: Uuid, points: i64, order_id: &str) -> Result<PointsTransaction, Error> {
        self.ledger
            .debit(user_id, points, SourceType::Order, Some(order_id), Some("Points used for order"))
            .await
    }

    pub async fn release_redemption(&self, redemption_id: Uuid, reason: UnfreezeReason) -> Result<PointsBalance, Error> {
        self.redemptions.unfreeze_points(redemption_id, reason).await
    }

    pub async fn validate_spend(&self, user_id: Uuid, points: i64, order_amount: f64) -> Result<SpendValidation, Error> {
        let level = self.ledger.current_level(user_id).await?;
        Ok(self.rules.engine().await.validate_spend(&level, points, order_amount))
    }

    pub async fn member_discount(&self, user_id: Uuid, order_amount: f64) -> Result<f64, Error> {
        let code = self.ledger.current_level(user_id).await?;
        let table = self.levels.table().await;
        let level = table.by_code(&code).unwrap_or_else(|| table.lowest());
        Ok(LevelTable::calculate_discount(level, order_amount))
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn get_points(&self, user_id: Uuid) -> Result<PointsOverview, Error> {
        let balance = self.ledger.get_balance(user_id).await?;
        let table = self.levels.table().await;
        let level = table.resolve(balance.total_points);
        Ok(PointsOverview {
            level_name: level.name.clone(),
            progress: table.progress(balance.total_points),
            balance,
        })
    }

    pub async fn get_expiring_points(&self, user_id: Uuid, within_days: i64) -> Result<Vec<ExpiringPoints>, Error> {
        self.expirations.get_expiring_points(user_id, within_days).await
    }

    pub async fn transaction_history(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointsTransaction>, Error> {
        self.ledger.list_transactions(user_id, limit, offset).await
    }

    // ------------------------------------------------------------------
    // Scheduled + admin
    // ------------------------------------------------------------------

    pub async fn check_and_expire_points(&self) -> Result<ExpirationSweepReport, Error> {
        self.expirations.process_expirations().await
    }

    pub async fn refund_lapsed_redemptions(&self) -> Result<usize, Error> {
        self.redemptions.process_lapsed_redemptions().await
    }

    pub async fn anomaly_report(&self, params: &AnomalyScanParams) -> Result<Vec<Anomaly>, Error> {
        self.anomalies.detect(params).await
    }

    pub async fn admin_adjust(&self, user_id: Uuid, delta: i64, reason: &str) -> Result<PointsTransaction, Error> {
        self.ledger.admin_adjust(user_id, delta, reason).await
    }
}
