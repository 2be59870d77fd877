// File: tablepoints-core/tests/test_utils/mod.rs
#![allow(dead_code)]

use uuid::Uuid;
use tablepoints_core::Error;
use tablepoints_core::models::{PointsTransaction, SourceType};

pub use tablepoints_core::test_utils::helpers::{default_levels, TestHarness};

/// Credits `points` from a throwaway order with an explicit expiry window.
pub async fn seed_points(
    harness: &TestHarness,
    user_id: Uuid,
    points: i64,
    expire_days: i64,
) -> Result<PointsTransaction, Error> {
    let order_id = Uuid::new_v4().to_string();
    harness
        .service
        .ledger()
        .earn(user_id, points, SourceType::Order, Some(&order_id), Some("seed"), Some(expire_days))
        .await
}

pub fn assert_invariant(harness: &TestHarness, user_id: Uuid) {
    let b = harness
        .store
        .balance_snapshot(user_id)
        .expect("balance row should exist");
    assert!(
        b.available_points + b.frozen_points <= b.total_points,
        "invariant broken: {:?}",
        b
    );
}
