// tests/ledger_tests.rs

mod test_utils;

use std::sync::Arc;
use uuid::Uuid;

use tablepoints_core::Error;
use tablepoints_core::models::{
    OrderEarnConfig, OrderPaid, ReviewApproved, RuleConfig, SourceType, TransactionType,
};
use test_utils::{assert_invariant, seed_points, TestHarness};

#[tokio::test]
async fn test_earn_then_spend_exact_balance() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();

    let earned = seed_points(&h, user, 100, 365).await?;
    assert_eq!(earned.tx_type, TransactionType::Earn);
    assert_eq!(earned.balance_after, 100);

    let spent = h.service.consume_points(user, 100, "draw-1", Some("lottery draw")).await?;
    assert_eq!(spent.points, -100);
    assert_eq!(spent.balance_after, 0);
    assert_eq!(spent.tx_type, TransactionType::Consume);

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.available_points, 0);
    assert_eq!(b.total_points, 100);
    assert_invariant(&h, user);
    Ok(())
}

#[tokio::test]
async fn test_overspend_fails_without_transaction() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 100, 365).await?;

    let err = h
        .service
        .consume_points(user, 101, "draw-2", None)
        .await
        .expect_err("spending 101 of 100 must fail");
    match err {
        Error::InsufficientPoints { requested, available } => {
            assert_eq!(requested, 101);
            assert_eq!(available, 100);
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(h.store.all_transactions(user).len(), 1);
    assert_eq!(h.service.ledger().get_balance(user).await?.available_points, 100);
    Ok(())
}

#[tokio::test]
async fn test_non_positive_amounts_rejected() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();

    let err = h.service.award_points(user, 0, SourceType::Lottery, None, None).await;
    assert!(matches!(err, Err(Error::InvalidAmount(0))));

    let err = h.service.consume_points(user, -5, "draw", None).await;
    assert!(matches!(err, Err(Error::InvalidAmount(-5))));

    let err = h.service.admin_adjust(user, 0, "noop").await;
    assert!(matches!(err, Err(Error::InvalidAmount(0))));

    assert!(h.store.all_transactions(user).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_spending_never_lowers_total_or_level() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();

    seed_points(&h, user, 1_200, 365).await?;
    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.level_code, "silver");

    h.service.use_points_for_order(user, 1_200, "order-77").await?;
    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.available_points, 0);
    assert_eq!(b.total_points, 1_200);
    assert_eq!(b.level_code, "silver");

    let history = h.service.transaction_history(user, 10, 0).await?;
    assert_eq!(history[0].tx_type, TransactionType::Use);
    Ok(())
}

#[tokio::test]
async fn test_get_points_creates_row_with_progress() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();

    let overview = h.service.get_points(user).await?;
    assert_eq!(overview.balance.total_points, 0);
    assert_eq!(overview.balance.level_code, "bronze");
    assert_eq!(overview.level_name, "Bronze");
    assert_eq!(overview.progress.next_code.as_deref(), Some("silver"));
    assert_eq!(overview.progress.points_to_next, 1_000);
    assert!(h.store.balance_snapshot(user).is_some());
    Ok(())
}

#[tokio::test]
async fn test_order_points_use_level_multiplier() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    h.service.admin_adjust(user, 5_000, "vip import").await?;

    let order = OrderPaid {
        order_id: "order-1".into(),
        user_id: user,
        amount: 200.0,
    };
    let tx = h
        .service
        .earn_points_from_order(&order)
        .await?
        .expect("order should earn points");
    assert_eq!(tx.points, 300);
    assert_eq!(tx.source_type, SourceType::Order);
    assert_eq!(tx.source_id.as_deref(), Some("order-1"));
    Ok(())
}

#[tokio::test]
async fn test_order_below_min_amount_earns_nothing() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    h.set_rule(RuleConfig::OrderEarn(OrderEarnConfig {
        min_amount: 50.0,
        ..OrderEarnConfig::default()
    }))
    .await?;
    let user = Uuid::new_v4();

    let order = OrderPaid {
        order_id: "small".into(),
        user_id: user,
        amount: 40.0,
    };
    assert!(h.service.earn_points_from_order(&order).await?.is_none());
    assert!(h.store.all_transactions(user).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_order_earn_is_idempotent() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    let order = OrderPaid {
        order_id: "order-dup".into(),
        user_id: user,
        amount: 88.8,
    };

    let first = h.service.earn_points_from_order(&order).await?;
    assert_eq!(first.map(|t| t.points), Some(88));
    assert!(h.service.earn_points_from_order(&order).await?.is_none());

    assert_eq!(h.store.all_transactions(user).len(), 1);
    assert_eq!(h.service.ledger().get_balance(user).await?.available_points, 88);
    Ok(())
}

#[tokio::test]
async fn test_paying_with_points_still_earns_on_the_order() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 500, 365).await?;

    let used = h.service.use_points_for_order(user, 200, "order-9").await?;
    assert_eq!(used.tx_type, TransactionType::Use);
    assert_eq!(used.source_type, SourceType::Order);

    let order = OrderPaid {
        order_id: "order-9".into(),
        user_id: user,
        amount: 100.0,
    };
    let earned = h
        .service
        .earn_points_from_order(&order)
        .await?
        .expect("a points-paid order still earns");
    assert_eq!(earned.tx_type, TransactionType::Earn);
    assert_eq!(earned.points, 100);

    // A retry of the same event is still a no-op.
    assert!(h.service.earn_points_from_order(&order).await?.is_none());

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.available_points, 400);
    assert_eq!(b.total_points, 600);
    assert_invariant(&h, user);
    Ok(())
}

#[tokio::test]
async fn test_review_and_adoption_points() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    let review = ReviewApproved {
        review_id: "rv-1".into(),
        user_id: user,
        has_images: true,
        is_first_review: true,
    };

    let tx = h.service.earn_points_from_review(&review).await?.expect("review points");
    assert_eq!(tx.points, 25);
    let tx = h.service.earn_points_from_adoption(&review).await?.expect("adoption points");
    assert_eq!(tx.points, 20);
    assert_eq!(tx.source_type, SourceType::ReviewAdoption);

    // Same review id, different source: both granted once.
    assert!(h.service.earn_points_from_review(&review).await?.is_none());
    assert!(h.service.earn_points_from_adoption(&review).await?.is_none());
    assert_eq!(h.service.ledger().get_balance(user).await?.total_points, 45);
    Ok(())
}

#[tokio::test]
async fn test_admin_adjust_both_directions() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();

    let credit = h.service.admin_adjust(user, 300, "goodwill").await?;
    assert_eq!(credit.tx_type, TransactionType::Adjust);
    assert_eq!(credit.source_type, SourceType::Admin);
    assert!(credit.expire_at.is_none());
    assert!(h.store.all_expirations(user).is_empty());

    let debit = h.service.admin_adjust(user, -100, "correction").await?;
    assert_eq!(debit.balance_after, 200);

    let err = h.service.admin_adjust(user, -201, "too much").await;
    assert!(matches!(err, Err(Error::InsufficientPoints { requested: 201, available: 200 })));

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.total_points, 300);
    assert_eq!(b.available_points, 200);
    Ok(())
}

#[tokio::test]
async fn test_history_is_newest_first_and_paged() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    for _ in 0..3 {
        seed_points(&h, user, 10, 365).await?;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }
    h.service.consume_points(user, 5, "draw", None).await?;

    let page = h.service.transaction_history(user, 2, 0).await?;
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].points, -5);
    assert_eq!(page[0].balance_after, 25);

    let rest = h.service.transaction_history(user, 10, 2).await?;
    assert_eq!(rest.len(), 2);
    assert!(rest.iter().all(|t| t.tx_type == TransactionType::Earn));
    Ok(())
}

#[tokio::test]
async fn test_validate_spend_and_member_discount() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 1_000, 365).await?;

    let check = h.service.validate_spend(user, 50, 100.0).await?;
    assert!(!check.valid);
    assert_eq!(check.reasons.len(), 1);

    let check = h.service.validate_spend(user, 200, 100.0).await?;
    assert!(check.valid, "{:?}", check.reasons);
    assert_eq!(check.max_usable_points, 5_000);

    // silver: 5% of 200
    let discount = h.service.member_discount(user, 200.0).await?;
    assert!((discount - 10.0).abs() < 1e-9);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_debits_never_overdraw() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    seed_points(&h, user, 100, 365).await?;

    let service = Arc::clone(&h.service);
    let mut handles = Vec::new();
    for i in 0..20 {
        let svc = service.clone();
        handles.push(tokio::spawn(async move {
            svc.consume_points(user, 10, &format!("draw-{i}"), None).await
        }));
    }

    let mut ok = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => ok += 1,
            Err(Error::InsufficientPoints { .. }) => insufficient += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }
    assert_eq!(ok, 10);
    assert_eq!(insufficient, 10);

    let b = h.service.ledger().get_balance(user).await?;
    assert_eq!(b.available_points, 0);
    assert_eq!(h.store.all_transactions(user).len(), 11);
    assert_invariant(&h, user);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_order_events_credit_once() -> Result<(), Error> {
    let h = TestHarness::new().await?;
    let user = Uuid::new_v4();
    let order = OrderPaid {
        order_id: "order-race".into(),
        user_id: user,
        amount: 120.0,
    };

    let mut handles = Vec::new();
    for _ in 0..10 {
        let svc = h.service.clone();
        let order = order.clone();
        handles.push(tokio::spawn(async move { svc.earn_points_from_order(&order).await }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.expect("task panicked")?.is_some() {
            granted += 1;
        }
    }
    assert_eq!(granted, 1);
    assert_eq!(h.store.all_transactions(user).len(), 1);
    assert_eq!(h.service.ledger().get_balance(user).await?.total_points, 120);
    Ok(())
}
