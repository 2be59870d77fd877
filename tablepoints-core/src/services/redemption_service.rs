// File: tablepoints-core/src/services/redemption_service.rs

use std::collections::HashSet;
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{error, info, warn};
use uuid::Uuid;

use tablepoints_common::models::{
    NewPointsTransaction, PointsBalance, RedeemedReward, RedemptionResult, RedemptionStatus,
    SourceType, TransactionType, UnfreezeReason,
};

use crate::repositories::{PointsRepository, RewardRepository};
use crate::services::ledger_service::LedgerService;
use crate::Error;

const CODE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 10;

fn generate_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_CHARSET[rng.random_range(0..CODE_CHARSET.len())] as char)
        .collect()
}

pub struct RedemptionService {
    points_repo: Arc<dyn PointsRepository>,
    rewards: Arc<dyn RewardRepository>,
    ledger: Arc<LedgerService>,
    batch_size: i64,
}

impl RedemptionService {
    pub fn new(
        points_repo: Arc<dyn PointsRepository>,
        rewards: Arc<dyn RewardRepository>,
        ledger: Arc<LedgerService>,
        batch_size: i64,
    ) -> Self {
        Self {
            points_repo,
            rewards,
            ledger,
            batch_size: batch_size.max(1),
        }
    }

    /// Buys a reward with points. The cost moves from `available_points`
    /// into `frozen_points` until the instance is used or lapses.
    ///
    /// A second call with the same `idempotency_key` fails with
    /// `DuplicateRedemption` and changes nothing.
    pub async fn redeem(&self, user_id: Uuid, reward_id: Uuid, idempotency_key: &str) -> Result<RedemptionResult, Error> {
        let key = idempotency_key.trim();
        if key.is_empty() {
            return Err(Error::InvalidState("idempotency key must not be empty".into()));
        }
        let source_id = reward_id.to_string();

        if self
            .points_repo
            .find_transaction(user_id, TransactionType::Redeem, SourceType::Redeem, &source_id, Some(key))
            .await?
            .is_some()
        {
            warn!("Duplicate redemption of reward {} by user {} (key='{}')", reward_id, user_id, key);
            return Err(Error::DuplicateRedemption(key.to_string()));
        }

        let reward = self
            .rewards
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| Error::RewardUnavailable(format!("reward {} does not exist", reward_id)))?;
        if !reward.is_redeemable() {
            return Err(Error::RewardUnavailable(format!("reward '{}' is inactive or out of stock", reward.name)));
        }
        let cost = reward.points_cost;
        if cost <= 0 {
            return Err(Error::InvalidAmount(cost));
        }

        let mut uow = self.ledger.begin(user_id).await?;
        if uow.find_transaction(TransactionType::Redeem, SourceType::Redeem, &source_id, Some(key)).await?.is_some() {
            return Err(Error::DuplicateRedemption(key.to_string()));
        }

        let now = Utc::now();
        let balance_after = {
            let b = uow.balance_mut();
            if b.available_points < cost {
                return Err(Error::InsufficientPoints {
                    requested: cost,
                    available: b.available_points,
                });
            }
            b.available_points -= cost;
            b.frozen_points += cost;
            b.updated_at = now;
            b.available_points
        };

        if !uow.decrement_reward_stock(reward_id).await? {
            return Err(Error::RewardUnavailable(format!("reward '{}' sold out", reward.name)));
        }

        let transaction = uow
            .append_transaction(NewPointsTransaction {
                user_id,
                tx_type: TransactionType::Redeem,
                points: -cost,
                balance_after,
                source_type: SourceType::Redeem,
                source_id: Some(source_id),
                description: Some(key.to_string()),
                expire_at: None,
                created_at: now,
            })
            .await?;
        self.ledger.refresh_level(uow.as_mut()).await;

        let redemption = RedeemedReward {
            redemption_id: Uuid::new_v4(),
            user_id,
            reward_id,
            points: cost,
            code: generate_code(),
            status: RedemptionStatus::Unused,
            idempotency_key: key.to_string(),
            expire_at: now + Duration::days(reward.valid_days.max(0)),
            created_at: now,
            updated_at: now,
        };
        uow.insert_redemption(&redemption).await?;

        let balance = uow.balance().clone();
        uow.commit().await?;

        info!("User {} redeemed '{}' for {} points (redemption={})", user_id, reward.name, cost, redemption.redemption_id);
        Ok(RedemptionResult {
            transaction,
            redemption,
            balance,
        })
    }

    /// Releases the frozen points of an unused redemption. `Used` discards
    /// them, `Expired` refunds them with an `adjust` transaction.
    pub async fn unfreeze_points(&self, redemption_id: Uuid, reason: UnfreezeReason) -> Result<PointsBalance, Error> {
        let user_id = self
            .points_repo
            .get_redemption(redemption_id)
            .await?
            .map(|r| r.user_id)
            .ok_or_else(|| Error::NotFound(format!("redemption {}", redemption_id)))?;

        let mut uow = self.ledger.begin(user_id).await?;
        let mut redemption = uow
            .get_redemption(redemption_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("redemption {}", redemption_id)))?;
        if redemption.status != RedemptionStatus::Unused {
            return Err(Error::InvalidState(format!(
                "redemption {} is already {}",
                redemption_id, redemption.status
            )));
        }

        let now = Utc::now();
        let (released, balance_after) = {
            let b = uow.balance_mut();
            let released = redemption.points.min(b.frozen_points).max(0);
            if released < redemption.points {
                warn!(
                    "User {} has only {} frozen points for redemption {} of {}",
                    user_id, b.frozen_points, redemption_id, redemption.points
                );
            }
            b.frozen_points -= released;
            if reason == UnfreezeReason::Expired {
                b.available_points += released;
            }
            b.updated_at = now;
            (released, b.available_points)
        };

        redemption.status = match reason {
            UnfreezeReason::Used => RedemptionStatus::Used,
            UnfreezeReason::Expired => RedemptionStatus::Expired,
        };
        redemption.updated_at = now;

        if reason == UnfreezeReason::Expired && released > 0 {
            uow.append_transaction(NewPointsTransaction {
                user_id,
                tx_type: TransactionType::Adjust,
                points: released,
                balance_after,
                source_type: SourceType::Redeem,
                source_id: Some(redemption_id.to_string()),
                description: Some("Refund of lapsed reward".to_string()),
                expire_at: None,
                created_at: now,
            })
            .await?;
        }
        uow.update_redemption(&redemption).await?;
        self.ledger.refresh_level(uow.as_mut()).await;

        let balance = uow.balance().clone();
        uow.commit().await?;
        info!("Redemption {} of user {} released as {:?} ({} points)", redemption_id, user_id, reason, released);
        Ok(balance)
    }

    pub async fn process_lapsed_redemptions(&self) -> Result<usize, Error> {
        self.process_lapsed_redemptions_at(Utc::now()).await
    }

    /// Refunds every unused redemption whose `expire_at` has passed.
    pub async fn process_lapsed_redemptions_at(&self, now: DateTime<Utc>) -> Result<usize, Error> {
        let mut refunded = 0;
        let mut failed: HashSet<Uuid> = HashSet::new();

        loop {
            let limit = self.batch_size + failed.len() as i64;
            let lapsed: Vec<RedeemedReward> = self
                .points_repo
                .list_lapsed_redemptions(now, limit)
                .await?
                .into_iter()
                .filter(|r| !failed.contains(&r.redemption_id))
                .collect();
            if lapsed.is_empty() {
                break;
            }

            for r in lapsed {
                match self.unfreeze_points(r.redemption_id, UnfreezeReason::Expired).await {
                    Ok(_) => refunded += 1,
                    Err(e) => {
                        error!("Refunding lapsed redemption {} failed: {:?}", r.redemption_id, e);
                        failed.insert(r.redemption_id);
                    }
                }
            }
        }
        Ok(refunded)
    }
}
