// File: tablepoints-core/src/services/ledger_service.rs

use std::sync::Arc;
use chrono::{Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use tablepoints_common::models::{
    NewPointsTransaction, PointsBalance, PointsTransaction, SourceType, TransactionType,
};

use crate::cache::{LevelStore, RuleStore};
use crate::repositories::{PointsRepository, PointsUnitOfWork};
use crate::services::expiration_service::schedule_expiration;
use crate::Error;

/// Balance mutations. Each public operation runs inside one unit of work, so
/// the read, the balance write and the transaction append happen under the
/// user's lock.
pub struct LedgerService {
    points_repo: Arc<dyn PointsRepository>,
    levels: Arc<LevelStore>,
    rules: Arc<RuleStore>,
}

impl LedgerService {
    pub fn new(
        points_repo: Arc<dyn PointsRepository>,
        levels: Arc<LevelStore>,
        rules: Arc<RuleStore>,
    ) -> Self {
        Self { points_repo, levels, rules }
    }

    /// Locks the user's balance, creating it at the lowest level when absent.
    pub async fn begin(&self, user_id: Uuid) -> Result<Box<dyn PointsUnitOfWork>, Error> {
        let table = self.levels.table().await;
        self.points_repo.begin(user_id, &table.lowest().code).await
    }

    /// Balance with its level re-derived from `total_points`. Creates the row
    /// on first access.
    pub async fn get_balance(&self, user_id: Uuid) -> Result<PointsBalance, Error> {
        if let Some(balance) = self.points_repo.get_balance(user_id).await? {
            let table = self.levels.table().await;
            if table.resolve(balance.total_points).code == balance.level_code {
                return Ok(balance);
            }
        }

        let mut uow = self.begin(user_id).await?;
        self.refresh_level(uow.as_mut()).await;
        let balance = uow.balance().clone();
        uow.commit().await?;
        Ok(balance)
    }

    /// Level code of the user as derived from cumulative points; never locks.
    pub async fn current_level(&self, user_id: Uuid) -> Result<String, Error> {
        let table = self.levels.table().await;
        let code = match self.points_repo.get_balance(user_id).await? {
            Some(b) => table.resolve(b.total_points).code.clone(),
            None => table.lowest().code.clone(),
        };
        Ok(code)
    }

    pub async fn earn(
        &self,
        user_id: Uuid,
        points: i64,
        source_type: SourceType,
        source_id: Option<&str>,
        description: Option<&str>,
        expire_days_override: Option<i64>,
    ) -> Result<PointsTransaction, Error> {
        check_positive(points)?;
        let valid_days = self.valid_days(expire_days_override).await;

        let mut uow = self.begin(user_id).await?;
        let tx = self
            .credit_locked(uow.as_mut(), points, source_type, source_id, description, valid_days)
            .await?;
        uow.commit().await?;
        Ok(tx)
    }

    /// Like [`earn`](Self::earn), but a no-op returning `None` when the user
    /// was already credited for `(source_type, source_id)`. Debits against
    /// the same source do not count.
    pub async fn earn_unique(
        &self,
        user_id: Uuid,
        points: i64,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
        expire_days_override: Option<i64>,
    ) -> Result<Option<PointsTransaction>, Error> {
        check_positive(points)?;
        if self
            .points_repo
            .find_transaction(user_id, TransactionType::Earn, source_type, source_id, None)
            .await?
            .is_some()
        {
            debug!("{} '{}' already granted to user {} => skipping", source_type, source_id, user_id);
            return Ok(None);
        }
        let valid_days = self.valid_days(expire_days_override).await;

        let mut uow = self.begin(user_id).await?;
        if uow.find_transaction(TransactionType::Earn, source_type, source_id, None).await?.is_some() {
            debug!("{} '{}' granted concurrently to user {} => skipping", source_type, source_id, user_id);
            return Ok(None);
        }
        let tx = self
            .credit_locked(uow.as_mut(), points, source_type, Some(source_id), description, valid_days)
            .await?;
        uow.commit().await?;
        Ok(Some(tx))
    }

    pub async fn debit(
        &self,
        user_id: Uuid,
        points: i64,
        source_type: SourceType,
        source_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<PointsTransaction, Error> {
        check_positive(points)?;
        let mut uow = self.begin(user_id).await?;
        let tx = self
            .debit_locked(uow.as_mut(), points, source_type, source_id, description)
            .await?;
        uow.commit().await?;
        Ok(tx)
    }

    /// Manual correction. Positive deltas credit without scheduling an expiry;
    /// negative deltas debit `available_points` only.
    pub async fn admin_adjust(&self, user_id: Uuid, delta: i64, reason: &str) -> Result<PointsTransaction, Error> {
        if delta == 0 {
            return Err(Error::InvalidAmount(delta));
        }
        let mut uow = self.begin(user_id).await?;
        let now = Utc::now();

        let balance_after = {
            let b = uow.balance_mut();
            if delta > 0 {
                b.total_points += delta;
                b.available_points += delta;
            } else {
                if b.available_points < -delta {
                    return Err(Error::InsufficientPoints {
                        requested: -delta,
                        available: b.available_points,
                    });
                }
                b.available_points += delta;
            }
            b.updated_at = now;
            b.available_points
        };
        self.refresh_level(uow.as_mut()).await;

        let tx = uow
            .append_transaction(NewPointsTransaction {
                user_id,
                tx_type: TransactionType::Adjust,
                points: delta,
                balance_after,
                source_type: SourceType::Admin,
                source_id: None,
                description: Some(reason.to_string()),
                expire_at: None,
                created_at: now,
            })
            .await?;
        uow.commit().await?;
        info!("Admin adjusted user {} by {} ({})", user_id, delta, reason);
        Ok(tx)
    }

    pub async fn list_transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointsTransaction>, Error> {
        self.points_repo
            .list_transactions(user_id, limit.clamp(1, 500), offset.max(0))
            .await
    }

    async fn valid_days(&self, expire_days_override: Option<i64>) -> i64 {
        match expire_days_override {
            Some(days) => days.max(0),
            None => self.rules.expiration().await.expire_days.max(0),
        }
    }

    /// Credits an earn-type transaction inside an open unit of work and
    /// schedules its expiry when `valid_days > 0`.
    pub(crate) async fn credit_locked(
        &self,
        uow: &mut dyn PointsUnitOfWork,
        points: i64,
        source_type: SourceType,
        source_id: Option<&str>,
        description: Option<&str>,
        valid_days: i64,
    ) -> Result<PointsTransaction, Error> {
        let now = Utc::now();
        let user_id = uow.balance().user_id;
        let balance_after = {
            let b = uow.balance_mut();
            b.total_points += points;
            b.available_points += points;
            b.updated_at = now;
            b.available_points
        };
        self.refresh_level(uow).await;

        let expire_at = (valid_days > 0).then(|| now + Duration::days(valid_days));
        let tx = uow
            .append_transaction(NewPointsTransaction {
                user_id,
                tx_type: TransactionType::Earn,
                points,
                balance_after,
                source_type,
                source_id: source_id.map(str::to_string),
                description: description.map(str::to_string),
                expire_at,
                created_at: now,
            })
            .await?;
        schedule_expiration(uow, &tx, valid_days).await?;

        debug!("User {} earned {} points from {} (available={})", user_id, points, source_type, balance_after);
        Ok(tx)
    }

    /// Debits `available_points` inside an open unit of work. The check and
    /// the write share the lock.
    pub(crate) async fn debit_locked(
        &self,
        uow: &mut dyn PointsUnitOfWork,
        points: i64,
        source_type: SourceType,
        source_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<PointsTransaction, Error> {
        let now = Utc::now();
        let user_id = uow.balance().user_id;
        let balance_after = {
            let b = uow.balance_mut();
            if b.available_points < points {
                return Err(Error::InsufficientPoints {
                    requested: points,
                    available: b.available_points,
                });
            }
            b.available_points -= points;
            b.updated_at = now;
            b.available_points
        };
        self.refresh_level(uow).await;

        let tx = uow
            .append_transaction(NewPointsTransaction {
                user_id,
                tx_type: TransactionType::for_debit(source_type),
                points: -points,
                balance_after,
                source_type,
                source_id: source_id.map(str::to_string),
                description: description.map(str::to_string),
                expire_at: None,
                created_at: now,
            })
            .await?;

        debug!("User {} spent {} points on {} (available={})", user_id, points, source_type, balance_after);
        Ok(tx)
    }

    /// Re-derives the level from `total_points`.
    pub(crate) async fn refresh_level(&self, uow: &mut dyn PointsUnitOfWork) {
        let table = self.levels.table().await;
        let b = uow.balance_mut();
        let resolved = &table.resolve(b.total_points).code;
        if *resolved != b.level_code {
            info!(
                "User {} level {} => {} (total_points={})",
                b.user_id, b.level_code, resolved, b.total_points
            );
            b.level_code = resolved.clone();
        }
    }
}

fn check_positive(points: i64) -> Result<(), Error> {
    if points <= 0 {
        return Err(Error::InvalidAmount(points));
    }
    Ok(())
}
