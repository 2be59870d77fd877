// File: tablepoints-core/src/repositories/postgres/rewards.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use tablepoints_common::models::Reward;
use tablepoints_common::traits::repository_traits::RewardRepository;

use super::rows::{reward_from_row, REWARD_COLUMNS};
use crate::Error;

#[derive(Clone)]
pub struct PostgresRewardRepository {
    pool: Pool<Postgres>,
}

impl PostgresRewardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RewardRepository for PostgresRewardRepository {
    async fn create_reward(&self, rw: &Reward) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO rewards (
                reward_id, name, points_cost, stock, is_active, valid_days, created_at, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
            .bind(rw.reward_id)
            .bind(&rw.name)
            .bind(rw.points_cost)
            .bind(rw.stock)
            .bind(rw.is_active)
            .bind(rw.valid_days)
            .bind(rw.created_at)
            .bind(rw.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, Error> {
        let sql = format!("SELECT {REWARD_COLUMNS} FROM rewards WHERE reward_id = $1");
        let row_opt = sqlx::query(&sql)
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(reward_from_row(&r)?)),
            None => Ok(None),
        }
    }

    async fn list_rewards(&self) -> Result<Vec<Reward>, Error> {
        let sql = format!("SELECT {REWARD_COLUMNS} FROM rewards ORDER BY name ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(reward_from_row(&r)?);
        }
        Ok(list)
    }

    async fn update_reward(&self, rw: &Reward) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE rewards
            SET name = $1,
                points_cost = $2,
                stock = $3,
                is_active = $4,
                valid_days = $5,
                updated_at = $6
            WHERE reward_id = $7
            "#,
        )
            .bind(&rw.name)
            .bind(rw.points_cost)
            .bind(rw.stock)
            .bind(rw.is_active)
            .bind(rw.valid_days)
            .bind(rw.updated_at)
            .bind(rw.reward_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
