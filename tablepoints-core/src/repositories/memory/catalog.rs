// File: tablepoints-core/src/repositories/memory/catalog.rs
//
// Admin-managed tables: member levels, points rules, rewards.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use tablepoints_common::models::{MemberLevel, PointsRule, Reward, RuleKey};
use tablepoints_common::traits::repository_traits::{
    LevelRepository, RewardRepository, RuleRepository,
};

use super::points::MemoryPointsStore;
use crate::Error;

#[async_trait]
impl LevelRepository for MemoryPointsStore {
    async fn list_levels(&self) -> Result<Vec<MemberLevel>, Error> {
        let mut list: Vec<MemberLevel> = self.state.levels.read().values().cloned().collect();
        list.sort_by(|a, b| {
            a.min_points
                .cmp(&b.min_points)
                .then(a.sort_order.cmp(&b.sort_order))
        });
        Ok(list)
    }

    async fn upsert_level(&self, level: &MemberLevel) -> Result<(), Error> {
        self.state.levels.write().insert(level.level_id, level.clone());
        Ok(())
    }

    async fn delete_level(&self, level_id: Uuid) -> Result<(), Error> {
        self.state.levels.write().remove(&level_id);
        Ok(())
    }
}

#[async_trait]
impl RuleRepository for MemoryPointsStore {
    async fn get_rule(&self, key: RuleKey) -> Result<Option<PointsRule>, Error> {
        Ok(self.state.rules.read().get(&key).cloned())
    }

    async fn list_rules(&self) -> Result<Vec<PointsRule>, Error> {
        let mut list: Vec<PointsRule> = self.state.rules.read().values().cloned().collect();
        list.sort_by(|a, b| a.key().as_str().cmp(b.key().as_str()));
        Ok(list)
    }

    async fn upsert_rule(&self, rule: &PointsRule) -> Result<(), Error> {
        let mut rules = self.state.rules.write();
        let mut stored = rule.clone();
        if let Some(existing) = rules.get(&rule.key()) {
            stored.rule_id = existing.rule_id;
            stored.version = existing.version + 1;
        }
        stored.updated_at = Utc::now();
        rules.insert(stored.key(), stored);
        Ok(())
    }
}

#[async_trait]
impl RewardRepository for MemoryPointsStore {
    async fn create_reward(&self, reward: &Reward) -> Result<(), Error> {
        let mut rewards = self.state.rewards.write();
        if rewards.contains_key(&reward.reward_id) {
            return Err(Error::Parse(format!("Reward {} already exists", reward.reward_id)));
        }
        rewards.insert(reward.reward_id, reward.clone());
        Ok(())
    }

    async fn get_reward(&self, reward_id: Uuid) -> Result<Option<Reward>, Error> {
        Ok(self.state.rewards.read().get(&reward_id).cloned())
    }

    async fn list_rewards(&self) -> Result<Vec<Reward>, Error> {
        let mut list: Vec<Reward> = self.state.rewards.read().values().cloned().collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    async fn update_reward(&self, reward: &Reward) -> Result<(), Error> {
        let mut rewards = self.state.rewards.write();
        match rewards.get_mut(&reward.reward_id) {
            Some(existing) => {
                *existing = reward.clone();
                Ok(())
            }
            None => Err(Error::NotFound(format!("reward {}", reward.reward_id))),
        }
    }
}
