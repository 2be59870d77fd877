// File: tablepoints-core/src/repositories/postgres/points.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use tablepoints_common::models::{
    NewPointsTransaction, PointsBalance, PointsExpiration, PointsTransaction, RedeemedReward,
    SourceType, TransactionType,
};
use tablepoints_common::traits::repository_traits::{PointsRepository, PointsUnitOfWork};

use super::rows::{
    balance_from_row, expiration_from_row, redemption_from_row, transaction_from_row,
    BALANCE_COLUMNS, EXPIRATION_COLUMNS, REDEMPTION_COLUMNS, TRANSACTION_COLUMNS,
};
use crate::Error;

#[derive(Clone)]
pub struct PostgresPointsRepository {
    pool: Pool<Postgres>,
}

impl PostgresPointsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

/// Holds an open transaction with the user's balance row locked
/// (`SELECT ... FOR UPDATE`). Dropping it rolls everything back.
pub struct PgPointsUnitOfWork {
    tx: Transaction<'static, Postgres>,
    balance: PointsBalance,
}

#[async_trait]
impl PointsUnitOfWork for PgPointsUnitOfWork {
    fn balance(&self) -> &PointsBalance {
        &self.balance
    }

    fn balance_mut(&mut self) -> &mut PointsBalance {
        &mut self.balance
    }

    async fn find_transaction(
        &mut self,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM points_transactions
            WHERE user_id = $1
              AND tx_type = $5
              AND source_type = $2
              AND source_id = $3
              AND ($4::TEXT IS NULL OR description = $4)
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );
        let row_opt = sqlx::query(&sql)
            .bind(self.balance.user_id)
            .bind(source_type.to_string())
            .bind(source_id)
            .bind(description)
            .bind(tx_type.to_string())
            .fetch_optional(&mut *self.tx)
            .await?;

        match row_opt {
            Some(r) => Ok(Some(transaction_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn append_transaction(&mut self, new_tx: NewPointsTransaction) -> Result<PointsTransaction, Error> {
        let t = new_tx.into_transaction();
        sqlx::query(
            r#"
            INSERT INTO points_transactions (
                transaction_id, user_id, tx_type, points, balance_after,
                source_type, source_id, description, expire_at, created_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
            .bind(t.transaction_id)
            .bind(t.user_id)
            .bind(t.tx_type.to_string())
            .bind(t.points)
            .bind(t.balance_after)
            .bind(t.source_type.to_string())
            .bind(&t.source_id)
            .bind(&t.description)
            .bind(t.expire_at)
            .bind(t.created_at)
            .execute(&mut *self.tx)
            .await?;

        Ok(t)
    }

    async fn insert_expiration(&mut self, e: &PointsExpiration) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO points_expirations (
                expiration_id, user_id, transaction_id, points,
                expire_at, status, processed_at, created_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
            .bind(e.expiration_id)
            .bind(e.user_id)
            .bind(e.transaction_id)
            .bind(e.points)
            .bind(e.expire_at)
            .bind(e.status.to_string())
            .bind(e.processed_at)
            .bind(e.created_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_expiration(&mut self, expiration_id: Uuid) -> Result<Option<PointsExpiration>, Error> {
        let sql = format!(
            "SELECT {EXPIRATION_COLUMNS} FROM points_expirations WHERE expiration_id = $1 FOR UPDATE"
        );
        let row_opt = sqlx::query(&sql)
            .bind(expiration_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(expiration_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn update_expiration(&mut self, e: &PointsExpiration) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE points_expirations
            SET points = $1,
                status = $2,
                processed_at = $3
            WHERE expiration_id = $4
            "#,
        )
            .bind(e.points)
            .bind(e.status.to_string())
            .bind(e.processed_at)
            .bind(e.expiration_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn decrement_reward_stock(&mut self, reward_id: Uuid) -> Result<bool, Error> {
        let result = sqlx::query(
            r#"
            UPDATE rewards
            SET stock = stock - 1,
                updated_at = now()
            WHERE reward_id = $1
              AND is_active
              AND stock > 0
            "#,
        )
            .bind(reward_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_redemption(&mut self, rd: &RedeemedReward) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO redeemed_rewards (
                redemption_id, user_id, reward_id, points, code, status,
                idempotency_key, expire_at, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
            .bind(rd.redemption_id)
            .bind(rd.user_id)
            .bind(rd.reward_id)
            .bind(rd.points)
            .bind(&rd.code)
            .bind(rd.status.to_string())
            .bind(&rd.idempotency_key)
            .bind(rd.expire_at)
            .bind(rd.created_at)
            .bind(rd.updated_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn get_redemption(&mut self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error> {
        let sql = format!(
            "SELECT {REDEMPTION_COLUMNS} FROM redeemed_rewards WHERE redemption_id = $1 FOR UPDATE"
        );
        let row_opt = sqlx::query(&sql)
            .bind(redemption_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(redemption_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn update_redemption(&mut self, rd: &RedeemedReward) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE redeemed_rewards
            SET status = $1,
                updated_at = $2
            WHERE redemption_id = $3
            "#,
        )
            .bind(rd.status.to_string())
            .bind(rd.updated_at)
            .bind(rd.redemption_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        let PgPointsUnitOfWork { mut tx, balance } = *self;
        sqlx::query(
            r#"
            UPDATE points_balances
            SET total_points = $1,
                available_points = $2,
                frozen_points = $3,
                level_code = $4,
                updated_at = $5
            WHERE user_id = $6
            "#,
        )
            .bind(balance.total_points)
            .bind(balance.available_points)
            .bind(balance.frozen_points)
            .bind(&balance.level_code)
            .bind(balance.updated_at)
            .bind(balance.user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl PointsRepository for PostgresPointsRepository {
    async fn begin(&self, user_id: Uuid, default_level: &str) -> Result<Box<dyn PointsUnitOfWork>, Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO points_balances (user_id, level_code)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
            .bind(user_id)
            .bind(default_level)
            .execute(&mut *tx)
            .await?;

        let sql = format!("SELECT {BALANCE_COLUMNS} FROM points_balances WHERE user_id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let balance = balance_from_row(&row)?;

        Ok(Box::new(PgPointsUnitOfWork { tx, balance }))
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
        let sql = format!("SELECT {BALANCE_COLUMNS} FROM points_balances WHERE user_id = $1");
        let row_opt = sqlx::query(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(balance_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn find_transaction(
        &self,
        user_id: Uuid,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM points_transactions
            WHERE user_id = $1
              AND tx_type = $5
              AND source_type = $2
              AND source_id = $3
              AND ($4::TEXT IS NULL OR description = $4)
            ORDER BY created_at ASC
            LIMIT 1
            "#
        );
        let row_opt = sqlx::query(&sql)
            .bind(user_id)
            .bind(source_type.to_string())
            .bind(source_id)
            .bind(description)
            .bind(tx_type.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(transaction_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointsTransaction>, Error> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM points_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(transaction_from_row(&r)?);
        }
        Ok(list)
    }

    async fn list_due_expirations(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<PointsExpiration>, Error> {
        let sql = format!(
            r#"
            SELECT {EXPIRATION_COLUMNS}
            FROM points_expirations
            WHERE status = 'pending'
              AND expire_at <= $1
            ORDER BY expire_at ASC
            LIMIT $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(expiration_from_row(&r)?);
        }
        Ok(list)
    }

    async fn list_pending_expirations(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<Vec<PointsExpiration>, Error> {
        let sql = format!(
            r#"
            SELECT {EXPIRATION_COLUMNS}
            FROM points_expirations
            WHERE user_id = $1
              AND status = 'pending'
              AND expire_at <= $2
            ORDER BY expire_at ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(expiration_from_row(&r)?);
        }
        Ok(list)
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error> {
        let sql = format!("SELECT {REDEMPTION_COLUMNS} FROM redeemed_rewards WHERE redemption_id = $1");
        let row_opt = sqlx::query(&sql)
            .bind(redemption_id)
            .fetch_optional(&self.pool)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(redemption_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_lapsed_redemptions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RedeemedReward>, Error> {
        let sql = format!(
            r#"
            SELECT {REDEMPTION_COLUMNS}
            FROM redeemed_rewards
            WHERE status = 'unused'
              AND expire_at <= $1
            ORDER BY expire_at ASC
            LIMIT $2
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(redemption_from_row(&r)?);
        }
        Ok(list)
    }
}
