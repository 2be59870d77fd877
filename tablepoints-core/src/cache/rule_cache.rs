// File: src/cache/rule_cache.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, warn};

use tablepoints_common::models::{
    ExpirationConfig, OrderEarnConfig, PointsRule, PointsUsageConfig, ReviewEarnConfig,
    RuleConfig, RuleKey, RuleSnapshot,
};
use tablepoints_common::traits::repository_traits::RuleRepository;

use crate::engine::RulesEngine;
use crate::Error;

#[derive(Debug, Clone)]
struct CachedRule {
    rule: Option<PointsRule>,
    loaded_at: DateTime<Utc>,
}

/// Read-through cache over the rule table. A missing, inactive or
/// unreadable rule resolves to the documented default for its key, so point
/// accrual keeps working with incomplete admin configuration.
///
/// Administrative writes go through [`RuleStore::save_rule`], which
/// invalidates the affected key.
pub struct RuleStore {
    repo: Arc<dyn RuleRepository>,
    cache: DashMap<RuleKey, CachedRule>,
    ttl: Duration,
}

impl RuleStore {
    pub fn new(repo: Arc<dyn RuleRepository>, ttl: Duration) -> Self {
        Self {
            repo,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// The stored rule for `key` (active or not), if any.
    pub async fn get(&self, key: RuleKey) -> Option<PointsRule> {
        let cached = self.cache.get(&key).map(|e| e.value().clone());
        if let Some(entry) = &cached {
            if Utc::now().signed_duration_since(entry.loaded_at) < self.ttl {
                return entry.rule.clone();
            }
        }

        match self.repo.get_rule(key).await {
            Ok(rule) => {
                debug!("Loaded rule '{}' (present={})", key, rule.is_some());
                self.cache.insert(
                    key,
                    CachedRule {
                        rule: rule.clone(),
                        loaded_at: Utc::now(),
                    },
                );
                rule
            }
            Err(e) => {
                // Serve the stale copy if there is one; otherwise the caller
                // falls back to the default.
                warn!("Failed to load rule '{}': {:?}", key, e);
                cached.and_then(|c| c.rule)
            }
        }
    }

    /// Active config for `key`, or its default.
    pub async fn config(&self, key: RuleKey) -> RuleConfig {
        match self.get(key).await {
            Some(rule) if rule.is_active => rule.config,
            Some(_) => {
                debug!("Rule '{}' is inactive => using default", key);
                RuleConfig::default_for(key)
            }
            None => {
                warn!("Rule '{}' not configured => using default", key);
                RuleConfig::default_for(key)
            }
        }
    }

    pub async fn order_earn(&self) -> OrderEarnConfig {
        match self.config(RuleKey::OrderEarn).await {
            RuleConfig::OrderEarn(c) => c,
            _ => OrderEarnConfig::default(),
        }
    }

    pub async fn review_earn(&self) -> ReviewEarnConfig {
        match self.config(RuleKey::ReviewEarn).await {
            RuleConfig::ReviewEarn(c) => c,
            _ => ReviewEarnConfig::default(),
        }
    }

    pub async fn usage(&self) -> PointsUsageConfig {
        match self.config(RuleKey::PointsUsage).await {
            RuleConfig::PointsUsage(c) => c,
            _ => PointsUsageConfig::default(),
        }
    }

    pub async fn expiration(&self) -> ExpirationConfig {
        match self.config(RuleKey::PointsExpire).await {
            RuleConfig::PointsExpire(c) => c,
            _ => ExpirationConfig::default(),
        }
    }

    pub async fn snapshot(&self) -> RuleSnapshot {
        let mut snapshot = RuleSnapshot::default();
        for key in RuleKey::ALL {
            snapshot.apply(self.config(key).await);
        }
        snapshot
    }

    pub async fn engine(&self) -> RulesEngine {
        RulesEngine::new(self.snapshot().await)
    }

    /// Admin write: validates, persists, then drops the cached entry.
    pub async fn save_rule(&self, rule: &PointsRule) -> Result<(), Error> {
        rule.config.validate()?;
        self.repo.upsert_rule(rule).await?;
        self.invalidate(rule.key());
        info!("Rule '{}' saved (version={}, active={})", rule.key(), rule.version, rule.is_active);
        Ok(())
    }

    pub fn invalidate(&self, key: RuleKey) {
        self.cache.remove(&key);
    }

    pub fn invalidate_all(&self) {
        self.cache.clear();
    }
}
