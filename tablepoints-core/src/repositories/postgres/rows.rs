// File: tablepoints-core/src/repositories/postgres/rows.rs
//
// Column lists and row decoders shared by the Postgres repositories.
// Enum columns are stored as TEXT and parsed through `FromStr`.

use sqlx::postgres::PgRow;
use sqlx::Row;

use tablepoints_common::models::{
    DiscountType, ExpirationStatus, MemberLevel, PointsBalance, PointsExpiration, PointsRule,
    PointsTransaction, RedeemedReward, RedemptionStatus, Reward, RuleConfig, RuleKey,
    SourceType, TransactionType,
};
use crate::Error;

pub const BALANCE_COLUMNS: &str =
    "user_id, total_points, available_points, frozen_points, level_code, created_at, updated_at";

pub const TRANSACTION_COLUMNS: &str =
    "transaction_id, user_id, tx_type, points, balance_after, source_type, source_id, description, expire_at, created_at";

pub const EXPIRATION_COLUMNS: &str =
    "expiration_id, user_id, transaction_id, points, expire_at, status, processed_at, created_at";

pub const LEVEL_COLUMNS: &str =
    "level_id, code, name, min_points, discount_type, discount_value, max_discount_amount, min_order_amount, sort_order, is_active, updated_at";

pub const RULE_COLUMNS: &str =
    "rule_id, rule_key, rule_type, name, config, is_active, version, updated_at";

pub const REWARD_COLUMNS: &str =
    "reward_id, name, points_cost, stock, is_active, valid_days, created_at, updated_at";

pub const REDEMPTION_COLUMNS: &str =
    "redemption_id, user_id, reward_id, points, code, status, idempotency_key, expire_at, created_at, updated_at";

pub fn balance_from_row(r: &PgRow) -> Result<PointsBalance, Error> {
    Ok(PointsBalance {
        user_id: r.try_get("user_id")?,
        total_points: r.try_get("total_points")?,
        available_points: r.try_get("available_points")?,
        frozen_points: r.try_get("frozen_points")?,
        level_code: r.try_get("level_code")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub fn transaction_from_row(r: &PgRow) -> Result<PointsTransaction, Error> {
    let tx_type: String = r.try_get("tx_type")?;
    let source_type: String = r.try_get("source_type")?;
    Ok(PointsTransaction {
        transaction_id: r.try_get("transaction_id")?,
        user_id: r.try_get("user_id")?,
        tx_type: tx_type.parse::<TransactionType>()?,
        points: r.try_get("points")?,
        balance_after: r.try_get("balance_after")?,
        source_type: source_type.parse::<SourceType>()?,
        source_id: r.try_get("source_id")?,
        description: r.try_get("description")?,
        expire_at: r.try_get("expire_at")?,
        created_at: r.try_get("created_at")?,
    })
}

pub fn expiration_from_row(r: &PgRow) -> Result<PointsExpiration, Error> {
    let status: String = r.try_get("status")?;
    Ok(PointsExpiration {
        expiration_id: r.try_get("expiration_id")?,
        user_id: r.try_get("user_id")?,
        transaction_id: r.try_get("transaction_id")?,
        points: r.try_get("points")?,
        expire_at: r.try_get("expire_at")?,
        status: status.parse::<ExpirationStatus>()?,
        processed_at: r.try_get("processed_at")?,
        created_at: r.try_get("created_at")?,
    })
}

pub fn level_from_row(r: &PgRow) -> Result<MemberLevel, Error> {
    let discount_type: String = r.try_get("discount_type")?;
    Ok(MemberLevel {
        level_id: r.try_get("level_id")?,
        code: r.try_get("code")?,
        name: r.try_get("name")?,
        min_points: r.try_get("min_points")?,
        discount_type: discount_type.parse::<DiscountType>()?,
        discount_value: r.try_get("discount_value")?,
        max_discount_amount: r.try_get("max_discount_amount")?,
        min_order_amount: r.try_get("min_order_amount")?,
        sort_order: r.try_get("sort_order")?,
        is_active: r.try_get("is_active")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Config payloads are validated here, at load time.
pub fn rule_from_row(r: &PgRow) -> Result<PointsRule, Error> {
    let key: String = r.try_get("rule_key")?;
    let key = key.parse::<RuleKey>()?;
    let config: serde_json::Value = r.try_get("config")?;
    Ok(PointsRule {
        rule_id: r.try_get("rule_id")?,
        name: r.try_get("name")?,
        config: RuleConfig::from_json(key, config)?,
        is_active: r.try_get("is_active")?,
        version: r.try_get("version")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub fn reward_from_row(r: &PgRow) -> Result<Reward, Error> {
    Ok(Reward {
        reward_id: r.try_get("reward_id")?,
        name: r.try_get("name")?,
        points_cost: r.try_get("points_cost")?,
        stock: r.try_get("stock")?,
        is_active: r.try_get("is_active")?,
        valid_days: r.try_get("valid_days")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

pub fn redemption_from_row(r: &PgRow) -> Result<RedeemedReward, Error> {
    let status: String = r.try_get("status")?;
    Ok(RedeemedReward {
        redemption_id: r.try_get("redemption_id")?,
        user_id: r.try_get("user_id")?,
        reward_id: r.try_get("reward_id")?,
        points: r.try_get("points")?,
        code: r.try_get("code")?,
        status: status.parse::<RedemptionStatus>()?,
        idempotency_key: r.try_get("idempotency_key")?,
        expire_at: r.try_get("expire_at")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}
