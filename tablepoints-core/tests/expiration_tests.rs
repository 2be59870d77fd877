// tests/expiration_tests.rs

mod test_utils;

use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use tablepoints_core::Error;
use tablepoints_core::config::PointsConfig;
use tablepoints_core::models::{
    ExpirationConfig, ExpirationStatus, PointsBalance, PointsExpiration, PointsTransaction,
    RedeemedReward, RuleConfig, SourceType, TransactionType,
};
use tablepoints_core::repositories::{MemoryPointsStore, PointsRepository, PointsUnitOfWork};
use tablepoints_core::services::{PointsBackends, PointsService};
use test_utils::{assert_invariant, seed_points, TestHarness};

#[tokio::test]
async fn test_untouched_earn_expires_in_full() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    let earned = seed_points(&h, user, 100, 30).await?;

    let records = h.store.all_expirations(user);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].transaction_id, earned.transaction_id);
    assert_eq!(Some(records[0].expire_at), earned.expire_at);

    let report = h
        .service
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(31))
        .await?;
    assert_eq!(report.expired, 1);
    assert_eq!(report.cancelled, 0);
    assert_eq!(report.points_expired, 100);

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.available_points, 0);
    assert_eq!(b.total_points, 100);

    let record = &h.store.all_expirations(user)[0];
    assert_eq!(record.status, ExpirationStatus::Expired);
    assert_eq!(record.points, 100);
    assert!(record.processed_at.is_some());

    let expire_tx = h
        .store
        .all_transactions(user)
        .into_iter()
        .find(|t| t.tx_type == TransactionType::Expire)
        .expect("expire transaction");
    assert_eq!(expire_tx.points, -100);
    assert_eq!(expire_tx.source_type, SourceType::Expiration);
    assert_eq!(expire_tx.source_id, Some(record.expiration_id.to_string()));
    assert_invariant(&h, user);
    Ok(())
}

#[tokio::test]
async fn test_spent_points_cancel_the_record() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 100, 30).await?;
    h.service.consume_points(user, 100, "draw", None).await?;

    let report = h
        .service
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(31))
        .await?;
    assert_eq!(report.expired, 0);
    assert_eq!(report.cancelled, 1);

    let record = &h.store.all_expirations(user)[0];
    assert_eq!(record.status, ExpirationStatus::Cancelled);
    assert_eq!(h.service.ledger().get_balance(user).await?.available_points, 0);
    assert!(h
        .store
        .all_transactions(user)
        .iter()
        .all(|t| t.tx_type != TransactionType::Expire));
    Ok(())
}

#[tokio::test]
async fn test_partial_spend_expires_only_the_rest() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 100, 30).await?;
    h.service.consume_points(user, 60, "draw", None).await?;

    let report = h
        .service
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(31))
        .await?;
    assert_eq!(report.expired, 1);
    assert_eq!(report.points_expired, 40);

    let record = &h.store.all_expirations(user)[0];
    assert_eq!(record.status, ExpirationStatus::Expired);
    assert_eq!(record.points, 40);
    assert_eq!(h.service.ledger().get_balance(user).await?.available_points, 0);
    Ok(())
}

#[tokio::test]
async fn test_sweep_ignores_records_not_yet_due_and_reruns_cleanly() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 100, 30).await?;

    let early = h
        .service
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(29))
        .await?;
    assert_eq!(early.processed(), 0);
    assert_eq!(h.service.ledger().get_balance(user).await?.available_points, 100);

    let later = Utc::now() + Duration::days(31);
    let first = h.service.expirations().process_expirations_at(later).await?;
    let second = h.service.expirations().process_expirations_at(later).await?;
    assert_eq!(first.expired, 1);
    assert_eq!(second, Default::default());
    assert_eq!(h.store.all_transactions(user).len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_zero_expire_days_never_schedules() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    h.set_rule(RuleConfig::PointsExpire(ExpirationConfig { expire_days: 0 })).await?;
    let user = Uuid::new_v4();

    let tx = h.service.award_points(user, 50, SourceType::Lottery, Some("prize-1"), None).await?;
    assert!(tx.expire_at.is_none());
    assert!(h.store.all_expirations(user).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_rule_window_applies_when_no_override() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    h.set_rule(RuleConfig::PointsExpire(ExpirationConfig { expire_days: 10 })).await?;
    let user = Uuid::new_v4();

    let tx = h.service.award_points(user, 50, SourceType::Lottery, Some("prize-2"), None).await?;
    let expire_at = tx.expire_at.expect("expiry stamped on the earn");
    assert_eq!(expire_at - tx.created_at, Duration::days(10));
    Ok(())
}

#[tokio::test]
async fn test_expiring_points_projection() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 70, 5).await?;
    seed_points(&h, user, 30, 60).await?;

    let soon = h.service.get_expiring_points(user, 7).await?;
    assert_eq!(soon.len(), 1);
    assert_eq!(soon[0].points, 70);
    assert!(soon[0].days_left == 4 || soon[0].days_left == 5);

    let all = h.service.get_expiring_points(user, 90).await?;
    assert_eq!(all.len(), 2);
    assert!(all[0].expire_at <= all[1].expire_at);
    Ok(())
}

#[tokio::test]
async fn test_sweep_walks_every_batch() -> Result<(), Error> {
    let store = MemoryPointsStore::new();
    let config = PointsConfig {
        sweep_batch_size: 2,
        cache_ttl_secs: 0,
        ..PointsConfig::default()
    };
    let service = Arc::new(PointsService::new(PointsBackends::memory(&store), &config));

    let users: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
    for user in &users {
        service
            .ledger()
            .earn(*user, 10, SourceType::Order, Some("o"), None, Some(1))
            .await?;
    }

    let report = service
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(2))
        .await?;
    assert_eq!(report.expired, 5);
    assert_eq!(report.points_expired, 50);
    for user in &users {
        assert_eq!(store.balance_snapshot(*user).map(|b| b.available_points), Some(0));
    }
    Ok(())
}

#[tokio::test]
async fn test_scheduled_sweep_with_nothing_due() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    seed_points(&h, Uuid::new_v4(), 100, 30).await?;

    let report = tablepoints_core::tasks::run_expiration_sweep(&h.service).await?;
    assert_eq!(report.processed(), 0);
    assert_eq!(report.failed, 0);
    Ok(())
}

#[tokio::test]
async fn test_expiry_never_lowers_level() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 1_200, 30).await?;
    assert_eq!(h.service.ledger().get_balance(user).await?.level_code, "silver");

    let report = h
        .service
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(31))
        .await?;
    assert_eq!(report.points_expired, 1_200);

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.available_points, 0);
    assert_eq!(b.total_points, 1_200);
    assert_eq!(b.level_code, "silver");
    assert_eq!(h.service.get_points(user).await?.level_name, "Silver");
    Ok(())
}

/// Memory store whose lock acquisition fails for one user.
struct LockFailsFor {
    inner: MemoryPointsStore,
    broken_user: Uuid,
}

#[async_trait]
impl PointsRepository for LockFailsFor {
    async fn begin(&self, user_id: Uuid, default_level: &str) -> Result<Box<dyn PointsUnitOfWork>, Error> {
        if user_id == self.broken_user {
            return Err(Error::Parse("lock timeout".into()));
        }
        self.inner.begin(user_id, default_level).await
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
        self.inner.get_balance(user_id).await
    }

    async fn find_transaction(
        &self,
        user_id: Uuid,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error> {
        self.inner
            .find_transaction(user_id, tx_type, source_type, source_id, description)
            .await
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointsTransaction>, Error> {
        self.inner.list_transactions(user_id, limit, offset).await
    }

    async fn list_due_expirations(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<PointsExpiration>, Error> {
        self.inner.list_due_expirations(now, limit).await
    }

    async fn list_pending_expirations(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<Vec<PointsExpiration>, Error> {
        self.inner.list_pending_expirations(user_id, until).await
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error> {
        self.inner.get_redemption(redemption_id).await
    }

    async fn list_lapsed_redemptions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RedeemedReward>, Error> {
        self.inner.list_lapsed_redemptions(now, limit).await
    }
}

#[tokio::test]
async fn test_failing_record_does_not_stop_the_sweep() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let broken = Uuid::new_v4();
    let healthy: Vec<Uuid> = (0..2).map(|_| Uuid::new_v4()).collect();

    // The broken user's record is the oldest, so it heads every batch.
    seed_points(&h, broken, 100, 1).await?;
    for user in &healthy {
        seed_points(&h, *user, 40, 1).await?;
    }

    let backends = PointsBackends {
        points: Arc::new(LockFailsFor {
            inner: h.store.clone(),
            broken_user: broken,
        }),
        ..PointsBackends::memory(&h.store)
    };
    let config = PointsConfig {
        sweep_batch_size: 1,
        cache_ttl_secs: 0,
        ..PointsConfig::default()
    };
    let sweeper = PointsService::new(backends, &config);

    let report = sweeper
        .expirations()
        .process_expirations_at(Utc::now() + Duration::days(2))
        .await?;
    assert_eq!(report.failed, 1);
    assert_eq!(report.expired, 2);
    assert_eq!(report.points_expired, 80);

    for user in &healthy {
        assert_eq!(h.store.balance_snapshot(*user).map(|b| b.available_points), Some(0));
        assert_eq!(h.store.all_expirations(*user)[0].status, ExpirationStatus::Expired);
    }
    assert_eq!(h.store.balance_snapshot(broken).map(|b| b.available_points), Some(100));
    assert_eq!(h.store.all_expirations(broken)[0].status, ExpirationStatus::Pending);
    Ok(())
}
