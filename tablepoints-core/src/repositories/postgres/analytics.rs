// File: tablepoints-core/src/repositories/postgres/analytics.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use tablepoints_common::models::{PointsBalance, PointsTransaction, TransactionType};
use tablepoints_common::traits::repository_traits::PointsAnalyticsRepository;

use super::rows::{balance_from_row, transaction_from_row, BALANCE_COLUMNS, TRANSACTION_COLUMNS};
use crate::Error;

/// Aggregate reads for the anomaly detector. Never writes.
#[derive(Clone)]
pub struct PostgresPointsAnalyticsRepository {
    pool: Pool<Postgres>,
}

impl PostgresPointsAnalyticsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PointsAnalyticsRepository for PostgresPointsAnalyticsRepository {
    async fn earn_transactions_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, threshold: i64) -> Result<Vec<PointsTransaction>, Error> {
        let sql = format!(
            r#"
            SELECT {TRANSACTION_COLUMNS}
            FROM points_transactions
            WHERE tx_type = 'earn'
              AND created_at >= $1
              AND created_at <= $3
              AND points > $2
            ORDER BY points DESC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(threshold)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(transaction_from_row(&r)?);
        }
        Ok(list)
    }

    async fn transaction_counts_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, max_count: i64) -> Result<Vec<(Uuid, i64)>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, COUNT(*) AS tx_count
            FROM points_transactions
            WHERE created_at >= $1
              AND created_at <= $3
            GROUP BY user_id
            HAVING COUNT(*) > $2
            ORDER BY tx_count DESC
            "#,
        )
            .bind(since)
            .bind(max_count)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push((r.try_get("user_id")?, r.try_get("tx_count")?));
        }
        Ok(list)
    }

    async fn earn_totals_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, max_total: i64) -> Result<Vec<(Uuid, i64)>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, SUM(points)::BIGINT AS earned
            FROM points_transactions
            WHERE tx_type = 'earn'
              AND created_at >= $1
              AND created_at <= $3
            GROUP BY user_id
            HAVING SUM(points) > $2
            ORDER BY earned DESC
            "#,
        )
            .bind(since)
            .bind(max_total)
            .bind(until)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push((r.try_get("user_id")?, r.try_get("earned")?));
        }
        Ok(list)
    }

    async fn balances_violating_invariant(&self) -> Result<Vec<PointsBalance>, Error> {
        let sql = format!(
            r#"
            SELECT {BALANCE_COLUMNS}
            FROM points_balances
            WHERE available_points + frozen_points > total_points
               OR available_points < 0
               OR frozen_points < 0
            "#
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(balance_from_row(&r)?);
        }
        Ok(list)
    }

    async fn sum_points(&self, tx_type: TransactionType, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<i64, Error> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(ABS(points)), 0)::BIGINT AS total
            FROM points_transactions
            WHERE tx_type = $1
              AND created_at >= $2
              AND created_at <= $3
            "#,
        )
            .bind(tx_type.to_string())
            .bind(since)
            .bind(until)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("total")?)
    }
}
