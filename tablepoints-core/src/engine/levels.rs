// tablepoints-core/src/engine/levels.rs

use tablepoints_common::models::{DiscountType, LevelProgress, MemberLevel};

/// Code of the built-in level used when no configured level matches.
pub const DEFAULT_LEVEL_CODE: &str = "bronze";

/// Active levels ordered by `min_points` ascending.
#[derive(Debug, Clone)]
pub struct LevelTable {
    levels: Vec<MemberLevel>,
    fallback: MemberLevel,
}

impl LevelTable {
    pub fn new(levels: Vec<MemberLevel>) -> Self {
        Self::with_fallback(levels, DEFAULT_LEVEL_CODE)
    }

    pub fn with_fallback(levels: Vec<MemberLevel>, fallback_code: &str) -> Self {
        let mut levels: Vec<MemberLevel> = levels.into_iter().filter(|l| l.is_active).collect();
        levels.sort_by(|a, b| {
            a.min_points
                .cmp(&b.min_points)
                .then(a.sort_order.cmp(&b.sort_order))
        });
        Self {
            levels,
            fallback: MemberLevel::new(fallback_code, fallback_code, 0),
        }
    }

    pub fn levels(&self) -> &[MemberLevel] {
        &self.levels
    }

    /// Level given to a brand new balance row.
    pub fn lowest(&self) -> &MemberLevel {
        self.levels.first().unwrap_or(&self.fallback)
    }

    /// Highest active level whose threshold is covered by `total_points`.
    /// Always driven by cumulative points, so spending never demotes anyone.
    pub fn resolve(&self, total_points: i64) -> &MemberLevel {
        self.levels
            .iter()
            .rev()
            .find(|l| l.min_points <= total_points)
            .unwrap_or(&self.fallback)
    }

    pub fn by_code(&self, code: &str) -> Option<&MemberLevel> {
        self.levels.iter().find(|l| l.code == code)
    }

    pub fn progress(&self, total_points: i64) -> LevelProgress {
        let current = self.resolve(total_points);
        let next = self.levels.iter().find(|l| l.min_points > total_points);
        LevelProgress {
            current_code: current.code.clone(),
            next_code: next.map(|l| l.code.clone()),
            points_to_next: next.map(|l| l.min_points - total_points).unwrap_or(0),
        }
    }

    /// Member discount for an order of `order_amount` at `level`.
    pub fn calculate_discount(level: &MemberLevel, order_amount: f64) -> f64 {
        if order_amount <= 0.0 || order_amount < level.min_order_amount {
            return 0.0;
        }
        let discount = match level.discount_type {
            DiscountType::None => 0.0,
            DiscountType::Percentage => {
                let raw = order_amount * level.discount_value / 100.0;
                match level.max_discount_amount {
                    Some(cap) if cap > 0.0 => raw.min(cap),
                    _ => raw,
                }
            }
            DiscountType::Fixed => level.discount_value.min(order_amount),
        };
        discount.max(0.0)
    }
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
