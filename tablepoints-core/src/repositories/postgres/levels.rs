// File: tablepoints-core/src/repositories/postgres/levels.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use tablepoints_common::models::MemberLevel;
use tablepoints_common::traits::repository_traits::LevelRepository;

use super::rows::{level_from_row, LEVEL_COLUMNS};
use crate::Error;

#[derive(Clone)]
pub struct PostgresLevelRepository {
    pool: Pool<Postgres>,
}

impl PostgresLevelRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LevelRepository for PostgresLevelRepository {
    async fn list_levels(&self) -> Result<Vec<MemberLevel>, Error> {
        let sql = format!("SELECT {LEVEL_COLUMNS} FROM member_levels ORDER BY min_points ASC, sort_order ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            list.push(level_from_row(&r)?);
        }
        Ok(list)
    }

    async fn upsert_level(&self, level: &MemberLevel) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO member_levels (
                level_id, code, name, min_points, discount_type, discount_value,
                max_discount_amount, min_order_amount, sort_order, is_active, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
            ON CONFLICT (level_id) DO UPDATE
                SET code = EXCLUDED.code,
                    name = EXCLUDED.name,
                    min_points = EXCLUDED.min_points,
                    discount_type = EXCLUDED.discount_type,
                    discount_value = EXCLUDED.discount_value,
                    max_discount_amount = EXCLUDED.max_discount_amount,
                    min_order_amount = EXCLUDED.min_order_amount,
                    sort_order = EXCLUDED.sort_order,
                    is_active = EXCLUDED.is_active,
                    updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(level.level_id)
            .bind(&level.code)
            .bind(&level.name)
            .bind(level.min_points)
            .bind(level.discount_type.to_string())
            .bind(level.discount_value)
            .bind(level.max_discount_amount)
            .bind(level.min_order_amount)
            .bind(level.sort_order)
            .bind(level.is_active)
            .bind(level.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_level(&self, level_id: Uuid) -> Result<(), Error> {
        sqlx::query("DELETE FROM member_levels WHERE level_id = $1")
            .bind(level_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
