// File: tablepoints-common/src/models/anomaly.rs

use std::fmt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyType {
    LargeSingleEarn,
    TransactionBurst,
    AbnormalGrowthRate,
    BalanceInvariantViolation,
    AbnormalExpirationRatio,
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnomalyType::LargeSingleEarn => "large_single_earn",
            AnomalyType::TransactionBurst => "transaction_burst",
            AnomalyType::AbnormalGrowthRate => "abnormal_growth_rate",
            AnomalyType::BalanceInvariantViolation => "balance_invariant_violation",
            AnomalyType::AbnormalExpirationRatio => "abnormal_expiration_ratio",
        };
        write!(f, "{}", s)
    }
}

/// Ordered so that `Critical` sorts highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub message: String,
    pub evidence: Value,
    /// Used for ranking within one severity band.
    #[serde(skip)]
    pub magnitude: f64,
}

/// Thresholds and toggles for one anomaly scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyScanParams {
    pub check_large_earn: bool,
    pub large_earn_threshold: i64,
    pub large_earn_window_hours: i64,

    pub check_burst: bool,
    /// Max transactions per user in the trailing hour.
    pub burst_threshold: i64,

    pub check_growth: bool,
    /// Ceiling on the trailing-7-day average daily earn per user.
    pub daily_growth_ceiling: i64,

    pub check_invariant: bool,

    pub check_expiration_ratio: bool,
    /// Max acceptable expired/earned ratio over the trailing 30 days.
    pub expiration_ratio_threshold: f64,
}

impl Default for AnomalyScanParams {
    fn default() -> Self {
        Self {
            check_large_earn: true,
            large_earn_threshold: 10_000,
            large_earn_window_hours: 24,
            check_burst: true,
            burst_threshold: 50,
            check_growth: true,
            daily_growth_ceiling: 5_000,
            check_invariant: true,
            check_expiration_ratio: true,
            expiration_ratio_threshold: 0.5,
        }
    }
}
