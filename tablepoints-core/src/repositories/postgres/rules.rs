// File: tablepoints-core/src/repositories/postgres/rules.rs

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::warn;

use tablepoints_common::models::{PointsRule, RuleKey};
use tablepoints_common::traits::repository_traits::RuleRepository;

use super::rows::{rule_from_row, RULE_COLUMNS};
use crate::Error;

#[derive(Clone)]
pub struct PostgresRuleRepository {
    pool: Pool<Postgres>,
}

impl PostgresRuleRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleRepository for PostgresRuleRepository {
    async fn get_rule(&self, key: RuleKey) -> Result<Option<PointsRule>, Error> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM points_rules WHERE rule_key = $1");
        let row_opt = sqlx::query(&sql)
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await?;
        match row_opt {
            Some(r) => Ok(Some(rule_from_row(&r)?)),
            None => Ok(None),
        }
    }

    /// Rows with unknown keys or invalid configs are skipped with a warning.
    async fn list_rules(&self) -> Result<Vec<PointsRule>, Error> {
        let sql = format!("SELECT {RULE_COLUMNS} FROM points_rules ORDER BY rule_key ASC");
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await?;

        let mut list = Vec::new();
        for r in rows {
            match rule_from_row(&r) {
                Ok(rule) => list.push(rule),
                Err(e) => warn!("Skipping unreadable points rule: {:?}", e),
            }
        }
        Ok(list)
    }

    async fn upsert_rule(&self, rule: &PointsRule) -> Result<(), Error> {
        let config = rule.config.to_json()?;
        sqlx::query(
            r#"
            INSERT INTO points_rules (
                rule_id, rule_key, rule_type, name, config, is_active, version, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            ON CONFLICT (rule_key) DO UPDATE
                SET name = EXCLUDED.name,
                    config = EXCLUDED.config,
                    is_active = EXCLUDED.is_active,
                    version = points_rules.version + 1,
                    updated_at = EXCLUDED.updated_at
            "#,
        )
            .bind(rule.rule_id)
            .bind(rule.key().as_str())
            .bind(rule.rule_type().to_string())
            .bind(&rule.name)
            .bind(config)
            .bind(rule.is_active)
            .bind(rule.version)
            .bind(rule.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
