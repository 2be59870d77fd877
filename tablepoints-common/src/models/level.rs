// File: tablepoints-common/src/models/level.rs

use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    None,
    Percentage,
    Fixed,
}

impl fmt::Display for DiscountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscountType::None => write!(f, "none"),
            DiscountType::Percentage => write!(f, "percentage"),
            DiscountType::Fixed => write!(f, "fixed"),
        }
    }
}

impl FromStr for DiscountType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(DiscountType::None),
            "percentage" => Ok(DiscountType::Percentage),
            "fixed" => Ok(DiscountType::Fixed),
            _ => Err(format!("Unknown discount type: {}", s)),
        }
    }
}

/// A membership tier. Administrator-managed; the points core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberLevel {
    pub level_id: Uuid,
    pub code: String,
    pub name: String,
    /// Cumulative (`total_points`) threshold.
    pub min_points: i64,
    pub discount_type: DiscountType,
    pub discount_value: f64,
    pub max_discount_amount: Option<f64>,
    pub min_order_amount: f64,
    pub sort_order: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl MemberLevel {
    pub fn new(code: &str, name: &str, min_points: i64) -> Self {
        Self {
            level_id: Uuid::new_v4(),
            code: code.to_string(),
            name: name.to_string(),
            min_points,
            discount_type: DiscountType::None,
            discount_value: 0.0,
            max_discount_amount: None,
            min_order_amount: 0.0,
            sort_order: 0,
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_discount(
        mut self,
        discount_type: DiscountType,
        discount_value: f64,
        max_discount_amount: Option<f64>,
        min_order_amount: f64,
    ) -> Self {
        self.discount_type = discount_type;
        self.discount_value = discount_value;
        self.max_discount_amount = max_discount_amount;
        self.min_order_amount = min_order_amount;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub current_code: String,
    pub next_code: Option<String>,
    /// 0 when already at the top level.
    pub points_to_next: i64,
}
