// File: tablepoints-core/src/services/anomaly_service.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

use tablepoints_common::models::{Anomaly, AnomalyScanParams, AnomalyType, Severity, TransactionType};

use crate::repositories::PointsAnalyticsRepository;
use crate::Error;

const GROWTH_WINDOW_DAYS: i64 = 7;
const EXPIRATION_WINDOW_DAYS: i64 = 30;

/// Read-only scan of the ledger. Query failures are returned; findings are
/// never errors.
pub struct AnomalyDetector {
    analytics: Arc<dyn PointsAnalyticsRepository>,
}

fn escalate(value: f64, threshold: f64) -> Severity {
    if threshold > 0.0 && value >= 2.0 * threshold {
        Severity::High
    } else {
        Severity::Medium
    }
}

fn ratio(value: f64, threshold: f64) -> f64 {
    if threshold > 0.0 { value / threshold } else { value }
}

impl AnomalyDetector {
    pub fn new(analytics: Arc<dyn PointsAnalyticsRepository>) -> Self {
        Self { analytics }
    }

    pub async fn detect(&self, params: &AnomalyScanParams) -> Result<Vec<Anomaly>, Error> {
        self.detect_at(params, Utc::now()).await
    }

    /// Runs every enabled check as of `now`, most severe first.
    pub async fn detect_at(&self, params: &AnomalyScanParams, now: DateTime<Utc>) -> Result<Vec<Anomaly>, Error> {
        let mut found = Vec::new();

        if params.check_large_earn {
            self.large_earns(params, now, &mut found).await?;
        }
        if params.check_burst {
            self.bursts(params, now, &mut found).await?;
        }
        if params.check_growth {
            self.growth(params, now, &mut found).await?;
        }
        if params.check_invariant {
            self.invariant_violations(&mut found).await?;
        }
        if params.check_expiration_ratio {
            self.expiration_ratio(params, now, &mut found).await?;
        }

        found.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then(b.magnitude.total_cmp(&a.magnitude))
        });

        for a in &found {
            warn!("Points anomaly [{}] {}: {}", a.severity, a.anomaly_type, a.message);
        }
        info!("Anomaly scan finished with {} finding(s)", found.len());
        Ok(found)
    }

    async fn large_earns(&self, params: &AnomalyScanParams, now: DateTime<Utc>, out: &mut Vec<Anomaly>) -> Result<(), Error> {
        let since = now - Duration::hours(params.large_earn_window_hours.max(1));
        let threshold = params.large_earn_threshold;
        for tx in self.analytics.earn_transactions_above(since, now, threshold).await? {
            out.push(Anomaly {
                anomaly_type: AnomalyType::LargeSingleEarn,
                severity: escalate(tx.points as f64, threshold as f64),
                message: format!(
                    "User {} earned {} points in one transaction (threshold {})",
                    tx.user_id, tx.points, threshold
                ),
                evidence: json!({
                    "user_id": tx.user_id,
                    "transaction_id": tx.transaction_id,
                    "points": tx.points,
                    "source_type": tx.source_type,
                    "source_id": tx.source_id,
                    "created_at": tx.created_at,
                }),
                magnitude: ratio(tx.points as f64, threshold as f64),
            });
        }
        Ok(())
    }

    async fn bursts(&self, params: &AnomalyScanParams, now: DateTime<Utc>, out: &mut Vec<Anomaly>) -> Result<(), Error> {
        let since = now - Duration::hours(1);
        let threshold = params.burst_threshold;
        for (user_id, count) in self.analytics.transaction_counts_above(since, now, threshold).await? {
            out.push(Anomaly {
                anomaly_type: AnomalyType::TransactionBurst,
                severity: escalate(count as f64, threshold as f64),
                message: format!("User {} made {} transactions in the last hour (limit {})", user_id, count, threshold),
                evidence: json!({ "user_id": user_id, "count": count, "since": since }),
                magnitude: ratio(count as f64, threshold as f64),
            });
        }
        Ok(())
    }

    async fn growth(&self, params: &AnomalyScanParams, now: DateTime<Utc>, out: &mut Vec<Anomaly>) -> Result<(), Error> {
        let since = now - Duration::days(GROWTH_WINDOW_DAYS);
        let ceiling = params.daily_growth_ceiling;
        for (user_id, earned) in self.analytics.earn_totals_above(since, now, ceiling * GROWTH_WINDOW_DAYS).await? {
            let daily = earned as f64 / GROWTH_WINDOW_DAYS as f64;
            out.push(Anomaly {
                anomaly_type: AnomalyType::AbnormalGrowthRate,
                severity: escalate(daily, ceiling as f64),
                message: format!(
                    "User {} averaged {:.0} earned points per day over {} days (ceiling {})",
                    user_id, daily, GROWTH_WINDOW_DAYS, ceiling
                ),
                evidence: json!({ "user_id": user_id, "earned": earned, "daily_average": daily }),
                magnitude: ratio(daily, ceiling as f64),
            });
        }
        Ok(())
    }

    async fn invariant_violations(&self, out: &mut Vec<Anomaly>) -> Result<(), Error> {
        for b in self.analytics.balances_violating_invariant().await? {
            let excess = b.available_points + b.frozen_points - b.total_points;
            out.push(Anomaly {
                anomaly_type: AnomalyType::BalanceInvariantViolation,
                severity: Severity::Critical,
                message: format!(
                    "User {} has available {} + frozen {} above total {}",
                    b.user_id, b.available_points, b.frozen_points, b.total_points
                ),
                evidence: json!({
                    "user_id": b.user_id,
                    "total_points": b.total_points,
                    "available_points": b.available_points,
                    "frozen_points": b.frozen_points,
                }),
                magnitude: excess as f64,
            });
        }
        Ok(())
    }

    async fn expiration_ratio(&self, params: &AnomalyScanParams, now: DateTime<Utc>, out: &mut Vec<Anomaly>) -> Result<(), Error> {
        let since = now - Duration::days(EXPIRATION_WINDOW_DAYS);
        let earned = self.analytics.sum_points(TransactionType::Earn, since, now).await?;
        let expired = self.analytics.sum_points(TransactionType::Expire, since, now).await?;
        if expired == 0 {
            return Ok(());
        }

        let threshold = params.expiration_ratio_threshold;
        let (value, severity) = if earned == 0 {
            (f64::INFINITY, Severity::High)
        } else {
            let r = expired as f64 / earned as f64;
            if r <= threshold {
                return Ok(());
            }
            (r, escalate(r, threshold))
        };

        out.push(Anomaly {
            anomaly_type: AnomalyType::AbnormalExpirationRatio,
            severity,
            message: format!(
                "{} of {} points earned in the last {} days expired",
                expired, earned, EXPIRATION_WINDOW_DAYS
            ),
            evidence: json!({
                "earned": earned,
                "expired": expired,
                "ratio": value.is_finite().then_some(value),
                "threshold": threshold,
            }),
            magnitude: if value.is_finite() { ratio(value, threshold) } else { f64::MAX },
        });
        Ok(())
    }
}
