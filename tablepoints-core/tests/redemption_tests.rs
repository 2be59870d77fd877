// tests/redemption_tests.rs

mod test_utils;

use chrono::{Duration, Utc};
use uuid::Uuid;

use tablepoints_core::Error;
use tablepoints_core::models::{RedemptionStatus, SourceType, TransactionType, UnfreezeReason};
use tablepoints_core::repositories::RewardRepository;
use test_utils::{assert_invariant, seed_points, TestHarness};

#[tokio::test]
async fn test_redeem_freezes_points_and_takes_stock() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 500, 365).await?;
    let reward = h.add_reward("Free dessert", 300, 5, 14).await?;

    let result = h.service.redeem_coupon(user, reward.reward_id, "key-1").await?;
    assert_eq!(result.balance.available_points, 200);
    assert_eq!(result.balance.frozen_points, 300);
    assert_eq!(result.balance.total_points, 500);

    assert_eq!(result.transaction.tx_type, TransactionType::Redeem);
    assert_eq!(result.transaction.points, -300);
    assert_eq!(result.transaction.balance_after, 200);
    assert_eq!(result.transaction.source_type, SourceType::Redeem);
    assert_eq!(result.transaction.source_id, Some(reward.reward_id.to_string()));
    assert_eq!(result.transaction.description.as_deref(), Some("key-1"));

    let r = &result.redemption;
    assert_eq!(r.status, RedemptionStatus::Unused);
    assert_eq!(r.points, 300);
    assert_eq!(r.code.len(), 10);
    assert!(r.code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    assert_eq!(r.expire_at - r.created_at, Duration::days(14));

    assert_eq!(h.reward(reward.reward_id).await?.stock, 4);
    assert_invariant(&h, user);
    Ok(())
}

#[tokio::test]
async fn test_same_idempotency_key_redeems_once() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 1_000, 365).await?;
    let reward = h.add_reward("Coffee", 100, 10, 7).await?;

    h.service.redeem_coupon(user, reward.reward_id, "same-key").await?;
    let err = h.service.redeem_coupon(user, reward.reward_id, "same-key").await;
    assert!(matches!(err, Err(Error::DuplicateRedemption(ref k)) if k == "same-key"));

    let redeems = h
        .store
        .all_transactions(user)
        .into_iter()
        .filter(|t| t.tx_type == TransactionType::Redeem)
        .count();
    assert_eq!(redeems, 1);
    assert_eq!(h.store.all_redemptions(user).len(), 1);
    assert_eq!(h.reward(reward.reward_id).await?.stock, 9);

    // A fresh key is a new purchase.
    h.service.redeem_coupon(user, reward.reward_id, "other-key").await?;
    assert_eq!(h.store.all_redemptions(user).len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_insufficient_points_leave_everything_untouched() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 99, 365).await?;
    let reward = h.add_reward("Coffee", 100, 3, 7).await?;

    let err = h.service.redeem_coupon(user, reward.reward_id, "k").await;
    assert!(matches!(err, Err(Error::InsufficientPoints { requested: 100, available: 99 })));

    assert_eq!(h.reward(reward.reward_id).await?.stock, 3);
    assert_eq!(h.store.all_transactions(user).len(), 1);
    assert!(h.store.all_redemptions(user).is_empty());
    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!((b.available_points, b.frozen_points), (99, 0));
    Ok(())
}

#[tokio::test]
async fn test_unavailable_rewards_are_rejected() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 1_000, 365).await?;

    let sold_out = h.add_reward("Sold out", 10, 0, 7).await?;
    let err = h.service.redeem_coupon(user, sold_out.reward_id, "a").await;
    assert!(matches!(err, Err(Error::RewardUnavailable(_))));

    let mut retired = h.add_reward("Retired", 10, 5, 7).await?;
    retired.is_active = false;
    h.store.update_reward(&retired).await?;
    let err = h.service.redeem_coupon(user, retired.reward_id, "b").await;
    assert!(matches!(err, Err(Error::RewardUnavailable(_))));

    let err = h.service.redeem_coupon(user, Uuid::new_v4(), "c").await;
    assert!(matches!(err, Err(Error::RewardUnavailable(_))));

    assert_eq!(h.service.ledger().get_balance(user).await?.available_points, 1_000);
    Ok(())
}

#[tokio::test]
async fn test_last_unit_of_stock_goes_to_one_buyer() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    seed_points(&h, alice, 100, 365).await?;
    seed_points(&h, bob, 100, 365).await?;
    let reward = h.add_reward("Last one", 50, 1, 7).await?;

    h.service.redeem_coupon(alice, reward.reward_id, "a").await?;
    let err = h.service.redeem_coupon(bob, reward.reward_id, "b").await;
    assert!(matches!(err, Err(Error::RewardUnavailable(_))));
    assert_eq!(h.service.ledger().get_balance(bob).await?.available_points, 100);
    Ok(())
}

#[tokio::test]
async fn test_unfreeze_used_discards_frozen_points() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 500, 365).await?;
    let reward = h.add_reward("Dessert", 200, 5, 7).await?;
    let result = h.service.redeem_coupon(user, reward.reward_id, "k").await?;
    let tx_count = h.store.all_transactions(user).len();

    let b = h
        .service
        .release_redemption(result.redemption.redemption_id, UnfreezeReason::Used)
        .await?;
    assert_eq!((b.total_points, b.available_points, b.frozen_points), (500, 300, 0));
    assert_eq!(h.store.all_transactions(user).len(), tx_count);
    assert_eq!(h.store.all_redemptions(user)[0].status, RedemptionStatus::Used);

    let again = h
        .service
        .release_redemption(result.redemption.redemption_id, UnfreezeReason::Expired)
        .await;
    assert!(matches!(again, Err(Error::InvalidState(_))));
    assert_invariant(&h, user);
    Ok(())
}

#[tokio::test]
async fn test_unfreeze_expired_refunds_with_adjust() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 500, 365).await?;
    let reward = h.add_reward("Dessert", 200, 5, 7).await?;
    let result = h.service.redeem_coupon(user, reward.reward_id, "k").await?;

    let b = h
        .service
        .release_redemption(result.redemption.redemption_id, UnfreezeReason::Expired)
        .await?;
    assert_eq!((b.total_points, b.available_points, b.frozen_points), (500, 500, 0));

    let refund = h
        .store
        .all_transactions(user)
        .into_iter()
        .find(|t| t.tx_type == TransactionType::Adjust)
        .expect("refund transaction");
    assert_eq!(refund.points, 200);
    assert_eq!(refund.balance_after, 500);
    assert_eq!(h.store.all_redemptions(user)[0].status, RedemptionStatus::Expired);
    Ok(())
}

#[tokio::test]
async fn test_unknown_redemption_is_not_found() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let err = h.service.release_redemption(Uuid::new_v4(), UnfreezeReason::Used).await;
    assert!(matches!(err, Err(Error::NotFound(_))));
    Ok(())
}

#[tokio::test]
async fn test_lapsed_redemptions_are_refunded_by_the_sweep() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 500, 365).await?;
    let reward = h.add_reward("Short-lived", 100, 5, 3).await?;
    h.service.redeem_coupon(user, reward.reward_id, "k1").await?;
    h.service.redeem_coupon(user, reward.reward_id, "k2").await?;

    let redemptions = h.service.redemptions();
    assert_eq!(redemptions.process_lapsed_redemptions_at(Utc::now() + Duration::days(1)).await?, 0);
    assert_eq!(redemptions.process_lapsed_redemptions_at(Utc::now() + Duration::days(4)).await?, 2);

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!((b.available_points, b.frozen_points), (500, 0));
    assert!(h
        .store
        .all_redemptions(user)
        .iter()
        .all(|r| r.status == RedemptionStatus::Expired));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_retries_with_one_key() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 1_000, 365).await?;
    let reward = h.add_reward("Raced", 100, 50, 7).await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let svc = h.service.clone();
        let reward_id = reward.reward_id;
        handles.push(tokio::spawn(async move { svc.redeem_coupon(user, reward_id, "retry-key").await }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => ok += 1,
            Err(Error::DuplicateRedemption(_)) => {}
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(h.store.all_redemptions(user).len(), 1);
    assert_eq!(h.reward(reward.reward_id).await?.stock, 49);
    assert_eq!(h.service.ledger().get_balance(user).await?.frozen_points, 100);
    Ok(())
}
