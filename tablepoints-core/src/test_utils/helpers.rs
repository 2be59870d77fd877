// File: tablepoints-core/src/test_utils/helpers.rs

use std::sync::Arc;
use uuid::Uuid;

use tablepoints_common::models::{
    DiscountType, MemberLevel, PointsRule, Reward, RuleConfig, RuleKey,
};
use tablepoints_common::traits::repository_traits::{
    LevelRepository, RewardRepository, RuleRepository,
};

use crate::config::PointsConfig;
use crate::repositories::MemoryPointsStore;
use crate::services::{PointsBackends, PointsService};
use crate::Error;

/// bronze (0), silver (1000, 5%), gold (5000, 10% capped at 50).
pub fn default_levels() -> Vec<MemberLevel> {
    let mut silver = MemberLevel::new("silver", "Silver", 1_000)
        .with_discount(DiscountType::Percentage, 5.0, None, 0.0);
    silver.sort_order = 1;
    let mut gold = MemberLevel::new("gold", "Gold", 5_000)
        .with_discount(DiscountType::Percentage, 10.0, Some(50.0), 20.0);
    gold.sort_order = 2;
    vec![MemberLevel::new("bronze", "Bronze", 0), silver, gold]
}

/// Every service wired over one shared in-memory store.
pub struct TestHarness {
    pub store: MemoryPointsStore,
    pub service: Arc<PointsService>,
}

impl TestHarness {
    /// Seeds [`default_levels`] and the default rule for every key.
    pub async fn new() -> Result<Self, Error> {
        let harness = Self::bare();
        for level in default_levels() {
            harness.store.upsert_level(&level).await?;
        }
        for key in RuleKey::ALL {
            let rule = PointsRule::new(key.as_str(), RuleConfig::default_for(key));
            harness.store.upsert_rule(&rule).await?;
        }
        Ok(harness)
    }

    /// Nothing seeded; every lookup falls back to defaults.
    pub fn bare() -> Self {
        let store = MemoryPointsStore::new();
        let config = PointsConfig {
            cache_ttl_secs: 0,
            ..PointsConfig::default()
        };
        let service = Arc::new(PointsService::new(PointsBackends::memory(&store), &config));
        Self { store, service }
    }

    /// Stores `config` as the active rule for its key.
    pub async fn set_rule(&self, config: RuleConfig) -> Result<(), Error> {
        let rule = PointsRule::new(config.key().as_str(), config);
        self.service.rule_store().save_rule(&rule).await
    }

    pub async fn add_reward(&self, name: &str, points_cost: i64, stock: i32, valid_days: i64) -> Result<Reward, Error> {
        let reward = Reward::new(name, points_cost, stock, valid_days);
        self.store.create_reward(&reward).await?;
        Ok(reward)
    }

    pub async fn reward(&self, reward_id: Uuid) -> Result<Reward, Error> {
        self.store
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("reward {}", reward_id)))
    }
}
