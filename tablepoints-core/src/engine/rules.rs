// tablepoints-core/src/engine/rules.rs

use tablepoints_common::models::{RuleSnapshot, SpendValidation};

/// Multiplier groups for level codes that have no explicit entry in the
/// `order_earn.level_multiplier` map, matched by code prefix.
const LEVEL_GROUP_MULTIPLIERS: &[(&str, f64)] = &[
    ("diamond", 2.0),
    ("platinum", 2.0),
    ("gold", 1.5),
    ("silver", 1.2),
];

const BASE_MULTIPLIER: f64 = 1.0;

/// Floors a fractional point amount, never going below zero. The epsilon
/// keeps products such as `200.0 * 1.5` from losing a point to float error.
pub fn floor_points(value: f64) -> i64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    (value + 1e-9).floor() as i64
}

/// Stateless point arithmetic over one rule snapshot.
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    rules: RuleSnapshot,
}

impl RulesEngine {
    pub fn new(rules: RuleSnapshot) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RuleSnapshot {
        &self.rules
    }

    /// Earn multiplier of a level: exact map entry first, then the prefix
    /// group, then 1.0.
    pub fn level_multiplier(&self, level_code: &str) -> f64 {
        if let Some(m) = self.rules.order_earn.level_multiplier.get(level_code) {
            return *m;
        }
        let code = level_code.to_lowercase();
        LEVEL_GROUP_MULTIPLIERS
            .iter()
            .find(|(prefix, _)| code.starts_with(prefix))
            .map(|(_, m)| *m)
            .unwrap_or(BASE_MULTIPLIER)
    }

    pub fn points_from_order(&self, level_code: &str, order_amount: f64) -> i64 {
        let cfg = &self.rules.order_earn;
        if !order_amount.is_finite() || order_amount <= 0.0 || order_amount < cfg.min_amount {
            return 0;
        }
        let points = floor_points(order_amount * cfg.base_ratio * self.level_multiplier(level_code));
        match cfg.max_points_per_order {
            Some(cap) => points.min(cap).max(0),
            None => points,
        }
    }

    pub fn points_from_review(&self, level_code: &str, has_images: bool, is_first_review: bool) -> i64 {
        let cfg = &self.rules.review_earn;
        let mut base = cfg.base_points;
        if has_images {
            base += cfg.image_bonus;
        }
        if is_first_review {
            base += cfg.first_review_bonus;
        }
        floor_points(base as f64 * self.level_multiplier(level_code))
    }

    pub fn points_from_adoption(&self, level_code: &str) -> i64 {
        floor_points(self.rules.review_earn.adoption_base_points as f64 * self.level_multiplier(level_code))
    }

    fn max_percent(&self, level_code: &str) -> f64 {
        let cfg = &self.rules.usage;
        cfg.level_max_percent
            .get(level_code)
            .copied()
            .unwrap_or(cfg.max_percent)
    }

    /// Largest number of points that may be spent on an order of `order_amount`.
    pub fn max_usable_points(&self, level_code: &str, order_amount: f64) -> i64 {
        if !order_amount.is_finite() || order_amount <= 0.0 {
            return 0;
        }
        let offset = order_amount * self.max_percent(level_code) / 100.0;
        floor_points(offset * self.rules.usage.points_per_currency_unit as f64)
    }

    /// Currency value of `points`.
    pub fn points_value(&self, points: i64) -> f64 {
        let per_unit = self.rules.usage.points_per_currency_unit.max(1);
        points.max(0) as f64 / per_unit as f64
    }

    /// Checks a proposed spend against the usage rule. Never fails; every
    /// broken limit adds a reason.
    pub fn validate_spend(&self, level_code: &str, points: i64, order_amount: f64) -> SpendValidation {
        let cfg = &self.rules.usage;
        let max_usable = self.max_usable_points(level_code, order_amount);
        let mut reasons = Vec::new();

        if points <= 0 {
            reasons.push("Points to use must be greater than zero".to_string());
        } else {
            if points < cfg.min_points {
                reasons.push(format!("At least {} points are required to pay with points", cfg.min_points));
            }
            if points > max_usable {
                reasons.push(format!(
                    "Points can cover at most {}% of the order amount ({} points)",
                    self.max_percent(level_code),
                    max_usable
                ));
            }
        }

        SpendValidation {
            valid: reasons.is_empty(),
            reasons,
            max_usable_points: max_usable,
        }
    }

    /// Validity window of earned points in days; 0 means points never expire.
    pub fn expire_days(&self) -> i64 {
        self.rules.expiration.expire_days.max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablepoints_common::models::{OrderEarnConfig, PointsUsageConfig};

    fn engine_with(order: OrderEarnConfig) -> RulesEngine {
        RulesEngine::new(RuleSnapshot { order_earn: order, ..Default::default() })
    }

    #[test]
    fn order_points_use_ratio_and_multiplier() {
        let mut order = OrderEarnConfig::default();
        order.level_multiplier.insert("vip".into(), 1.5);
        let engine = engine_with(order);
        assert_eq!(engine.points_from_order("vip", 200.0), 300);
    }

    #[test]
    fn order_below_minimum_earns_nothing() {
        let engine = engine_with(OrderEarnConfig { min_amount: 50.0, ..Default::default() });
        assert_eq!(engine.points_from_order("bronze", 40.0), 0);
        assert_eq!(engine.points_from_order("bronze", 50.0), 50);
    }

    #[test]
    fn order_points_are_floored_and_capped() {
        let engine = engine_with(OrderEarnConfig {
            base_ratio: 0.7,
            max_points_per_order: Some(100),
            ..Default::default()
        });
        assert_eq!(engine.points_from_order("bronze", 99.99), 69);
        assert_eq!(engine.points_from_order("bronze", 1000.0), 100);
        assert_eq!(engine.points_from_order("bronze", -5.0), 0);
    }

    #[test]
    fn unknown_codes_use_prefix_groups() {
        let engine = RulesEngine::default();
        assert_eq!(engine.level_multiplier("bronze"), 1.0);
        assert_eq!(engine.level_multiplier("silver_2"), 1.2);
        assert_eq!(engine.level_multiplier("Gold"), 1.5);
        assert_eq!(engine.level_multiplier("diamond"), 2.0);
        assert_eq!(engine.level_multiplier("anything-else"), 1.0);
    }

    #[test]
    fn explicit_multiplier_beats_prefix() {
        let mut order = OrderEarnConfig::default();
        order.level_multiplier.insert("gold".into(), 3.0);
        assert_eq!(engine_with(order).level_multiplier("gold"), 3.0);
    }

    #[test]
    fn review_points_add_bonuses_then_multiply() {
        let engine = RulesEngine::default();
        // 10 + 5 + 10 at silver (1.2)
        assert_eq!(engine.points_from_review("silver", true, true), 30);
        assert_eq!(engine.points_from_review("bronze", false, false), 10);
        assert_eq!(engine.points_from_adoption("gold"), 30);
    }

    #[test]
    fn spend_validation_reports_every_reason() {
        let engine = RulesEngine::new(RuleSnapshot {
            usage: PointsUsageConfig {
                min_points: 100,
                max_percent: 50.0,
                points_per_currency_unit: 100,
                ..Default::default()
            },
            ..Default::default()
        });

        let ok = engine.validate_spend("bronze", 500, 20.0);
        assert!(ok.valid);
        assert_eq!(ok.max_usable_points, 1000);

        let too_few = engine.validate_spend("bronze", 50, 20.0);
        assert!(!too_few.valid);
        assert_eq!(too_few.reasons.len(), 1);

        let too_many = engine.validate_spend("bronze", 1500, 20.0);
        assert!(!too_many.valid);
        assert!(too_many.reasons[0].contains("50%"));

        let zero = engine.validate_spend("bronze", 0, 20.0);
        assert!(!zero.valid);
    }

    #[test]
    fn expire_days_default_and_disable() {
        assert_eq!(RulesEngine::default().expire_days(), 365);
        let mut snap = RuleSnapshot::default();
        snap.expiration.expire_days = 0;
        assert_eq!(RulesEngine::new(snap).expire_days(), 0);
    }

    #[test]
    fn floor_points_clamps_negative() {
        assert_eq!(floor_points(-3.2), 0);
        assert_eq!(floor_points(f64::NAN), 0);
        assert_eq!(floor_points(2.999), 2);
    }
}
