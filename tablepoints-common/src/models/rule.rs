// File: tablepoints-common/src/models/rule.rs

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Earn,
    Use,
    Expire,
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Earn => write!(f, "earn"),
            RuleType::Use => write!(f, "use"),
            RuleType::Expire => write!(f, "expire"),
        }
    }
}

impl FromStr for RuleType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earn" => Ok(RuleType::Earn),
            "use" => Ok(RuleType::Use),
            "expire" => Ok(RuleType::Expire),
            _ => Err(format!("Unknown rule type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKey {
    OrderEarn,
    ReviewEarn,
    PointsUsage,
    PointsExpire,
}

impl RuleKey {
    pub const ALL: [RuleKey; 4] = [
        RuleKey::OrderEarn,
        RuleKey::ReviewEarn,
        RuleKey::PointsUsage,
        RuleKey::PointsExpire,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKey::OrderEarn => "order_earn",
            RuleKey::ReviewEarn => "review_earn",
            RuleKey::PointsUsage => "points_usage",
            RuleKey::PointsExpire => "points_expire",
        }
    }

    pub fn rule_type(&self) -> RuleType {
        match self {
            RuleKey::OrderEarn | RuleKey::ReviewEarn => RuleType::Earn,
            RuleKey::PointsUsage => RuleType::Use,
            RuleKey::PointsExpire => RuleType::Expire,
        }
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleKey::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s.to_lowercase())
            .ok_or_else(|| format!("Unknown rule key: {}", s))
    }
}

/// `order_earn`: points = floor(amount * base_ratio * multiplier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderEarnConfig {
    /// Points per currency unit spent. Default 1.0.
    pub base_ratio: f64,
    /// Orders below this amount earn nothing. Default 0.
    pub min_amount: f64,
    /// Optional cap per order.
    pub max_points_per_order: Option<i64>,
    /// Exact level code => multiplier. Codes missing here use the
    /// prefix heuristic in the rules engine.
    pub level_multiplier: HashMap<String, f64>,
}

impl Default for OrderEarnConfig {
    fn default() -> Self {
        Self {
            base_ratio: 1.0,
            min_amount: 0.0,
            max_points_per_order: None,
            level_multiplier: HashMap::new(),
        }
    }
}

/// `review_earn`: flat points for reviews and adopted (featured) reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewEarnConfig {
    pub base_points: i64,
    pub image_bonus: i64,
    pub first_review_bonus: i64,
    pub adoption_base_points: i64,
}

impl Default for ReviewEarnConfig {
    fn default() -> Self {
        Self {
            base_points: 10,
            image_bonus: 5,
            first_review_bonus: 10,
            adoption_base_points: 20,
        }
    }
}

/// `points_usage`: limits on spending points against an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointsUsageConfig {
    pub min_points: i64,
    /// Max share of the order amount (0..=100) points may offset.
    pub max_percent: f64,
    /// How many points make one currency unit.
    pub points_per_currency_unit: i64,
    /// Optional per-level override of `max_percent`.
    pub level_max_percent: HashMap<String, f64>,
}

impl Default for PointsUsageConfig {
    fn default() -> Self {
        Self {
            min_points: 100,
            max_percent: 50.0,
            points_per_currency_unit: 100,
            level_max_percent: HashMap::new(),
        }
    }
}

/// `points_expire`: 0 disables expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpirationConfig {
    pub expire_days: i64,
}

impl Default for ExpirationConfig {
    fn default() -> Self {
        Self { expire_days: 365 }
    }
}

/// Typed rule payload, one variant per rule key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "key", content = "config", rename_all = "snake_case")]
pub enum RuleConfig {
    OrderEarn(OrderEarnConfig),
    ReviewEarn(ReviewEarnConfig),
    PointsUsage(PointsUsageConfig),
    PointsExpire(ExpirationConfig),
}

impl RuleConfig {
    pub fn key(&self) -> RuleKey {
        match self {
            RuleConfig::OrderEarn(_) => RuleKey::OrderEarn,
            RuleConfig::ReviewEarn(_) => RuleKey::ReviewEarn,
            RuleConfig::PointsUsage(_) => RuleKey::PointsUsage,
            RuleConfig::PointsExpire(_) => RuleKey::PointsExpire,
        }
    }

    /// The documented default for `key`, used whenever a rule is missing,
    /// inactive or unreadable.
    pub fn default_for(key: RuleKey) -> Self {
        match key {
            RuleKey::OrderEarn => RuleConfig::OrderEarn(OrderEarnConfig::default()),
            RuleKey::ReviewEarn => RuleConfig::ReviewEarn(ReviewEarnConfig::default()),
            RuleKey::PointsUsage => RuleConfig::PointsUsage(PointsUsageConfig::default()),
            RuleKey::PointsExpire => RuleConfig::PointsExpire(ExpirationConfig::default()),
        }
    }

    /// Parses the stored `config` column for `key`. Missing fields take
    /// their defaults; the result is validated before it is returned.
    pub fn from_json(key: RuleKey, value: Value) -> Result<Self, Error> {
        let value = if value.is_null() { Value::Object(Default::default()) } else { value };
        let cfg = match key {
            RuleKey::OrderEarn => RuleConfig::OrderEarn(serde_json::from_value(value)?),
            RuleKey::ReviewEarn => RuleConfig::ReviewEarn(serde_json::from_value(value)?),
            RuleKey::PointsUsage => RuleConfig::PointsUsage(serde_json::from_value(value)?),
            RuleKey::PointsExpire => RuleConfig::PointsExpire(serde_json::from_value(value)?),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// The bare payload, as stored in the `config` column.
    pub fn to_json(&self) -> Result<Value, Error> {
        let v = match self {
            RuleConfig::OrderEarn(c) => serde_json::to_value(c)?,
            RuleConfig::ReviewEarn(c) => serde_json::to_value(c)?,
            RuleConfig::PointsUsage(c) => serde_json::to_value(c)?,
            RuleConfig::PointsExpire(c) => serde_json::to_value(c)?,
        };
        Ok(v)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let bad = |msg: String| Err(Error::InvalidRule(format!("{}: {}", self.key(), msg)));
        match self {
            RuleConfig::OrderEarn(c) => {
                if !(c.base_ratio.is_finite() && c.base_ratio >= 0.0) {
                    return bad(format!("base_ratio must be >= 0, got {}", c.base_ratio));
                }
                if c.min_amount < 0.0 {
                    return bad(format!("min_amount must be >= 0, got {}", c.min_amount));
                }
                if let Some(cap) = c.max_points_per_order {
                    if cap < 0 {
                        return bad(format!("max_points_per_order must be >= 0, got {}", cap));
                    }
                }
                if let Some((code, m)) = c.level_multiplier.iter().find(|(_, m)| !(m.is_finite() && **m >= 0.0)) {
                    return bad(format!("level_multiplier[{}] must be >= 0, got {}", code, m));
                }
            }
            RuleConfig::ReviewEarn(c) => {
                if c.base_points < 0 || c.image_bonus < 0 || c.first_review_bonus < 0 || c.adoption_base_points < 0 {
                    return bad("review point values must be >= 0".to_string());
                }
            }
            RuleConfig::PointsUsage(c) => {
                if c.min_points < 0 {
                    return bad(format!("min_points must be >= 0, got {}", c.min_points));
                }
                if !(0.0..=100.0).contains(&c.max_percent) {
                    return bad(format!("max_percent must be within 0..=100, got {}", c.max_percent));
                }
                if c.points_per_currency_unit <= 0 {
                    return bad(format!("points_per_currency_unit must be > 0, got {}", c.points_per_currency_unit));
                }
                if let Some((code, p)) = c.level_max_percent.iter().find(|(_, p)| !(0.0..=100.0).contains(*p)) {
                    return bad(format!("level_max_percent[{}] must be within 0..=100, got {}", code, p));
                }
            }
            RuleConfig::PointsExpire(c) => {
                if c.expire_days < 0 {
                    return bad(format!("expire_days must be >= 0, got {}", c.expire_days));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointsRule {
    pub rule_id: Uuid,
    pub name: String,
    pub config: RuleConfig,
    pub is_active: bool,
    /// Bumped by every administrative write.
    pub version: i32,
    pub updated_at: DateTime<Utc>,
}

impl PointsRule {
    pub fn new(name: &str, config: RuleConfig) -> Self {
        Self {
            rule_id: Uuid::new_v4(),
            name: name.to_string(),
            config,
            is_active: true,
            version: 1,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> RuleKey {
        self.config.key()
    }

    pub fn rule_type(&self) -> RuleType {
        self.key().rule_type()
    }
}

/// Every rule the engine needs, with defaults already substituted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSnapshot {
    pub order_earn: OrderEarnConfig,
    pub review_earn: ReviewEarnConfig,
    pub usage: PointsUsageConfig,
    pub expiration: ExpirationConfig,
}

impl RuleSnapshot {
    pub fn apply(&mut self, config: RuleConfig) {
        match config {
            RuleConfig::OrderEarn(c) => self.order_earn = c,
            RuleConfig::ReviewEarn(c) => self.review_earn = c,
            RuleConfig::PointsUsage(c) => self.usage = c,
            RuleConfig::PointsExpire(c) => self.expiration = c,
        }
    }
}
