// File: tablepoints-core/src/services/expiration_service.rs

use std::collections::HashSet;
use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use tablepoints_common::models::{
    ExpirationStatus, ExpiringPoints, PointsExpiration, PointsTransaction, SourceType,
    TransactionType,
};

use crate::repositories::{PointsRepository, PointsUnitOfWork};
use crate::services::ledger_service::LedgerService;
use crate::Error;

/// Registers the future expiry of an earn transaction. Does nothing for other
/// transaction types, non-positive amounts or `valid_days <= 0`.
pub async fn schedule_expiration(
    uow: &mut dyn PointsUnitOfWork,
    tx: &PointsTransaction,
    valid_days: i64,
) -> Result<Option<PointsExpiration>, Error> {
    if tx.tx_type != TransactionType::Earn || tx.points <= 0 || valid_days <= 0 {
        return Ok(None);
    }
    let record = PointsExpiration {
        expiration_id: Uuid::new_v4(),
        user_id: tx.user_id,
        transaction_id: tx.transaction_id,
        points: tx.points,
        expire_at: tx.created_at + Duration::days(valid_days),
        status: ExpirationStatus::Pending,
        processed_at: None,
        created_at: tx.created_at,
    };
    uow.insert_expiration(&record).await?;
    Ok(Some(record))
}

/// Outcome counters of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationSweepReport {
    pub expired: usize,
    pub cancelled: usize,
    pub failed: usize,
    pub points_expired: i64,
}

impl ExpirationSweepReport {
    /// Records moved out of `pending`.
    pub fn processed(&self) -> usize {
        self.expired + self.cancelled
    }
}

enum RecordOutcome {
    Expired(i64),
    Cancelled,
    Skipped,
}

pub struct ExpirationService {
    points_repo: Arc<dyn PointsRepository>,
    ledger: Arc<LedgerService>,
    batch_size: i64,
}

impl ExpirationService {
    pub fn new(points_repo: Arc<dyn PointsRepository>, ledger: Arc<LedgerService>, batch_size: i64) -> Self {
        Self {
            points_repo,
            ledger,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn process_expirations(&self) -> Result<ExpirationSweepReport, Error> {
        self.process_expirations_at(Utc::now()).await
    }

    /// Expires every pending record due at `now`. A failing record is logged
    /// and left pending; the sweep moves on.
    pub async fn process_expirations_at(&self, now: DateTime<Utc>) -> Result<ExpirationSweepReport, Error> {
        let mut report = ExpirationSweepReport::default();
        let mut failed: HashSet<Uuid> = HashSet::new();

        loop {
            let limit = self.batch_size + failed.len() as i64;
            let due: Vec<PointsExpiration> = self
                .points_repo
                .list_due_expirations(now, limit)
                .await?
                .into_iter()
                .filter(|e| !failed.contains(&e.expiration_id))
                .collect();
            if due.is_empty() {
                break;
            }

            for record in due {
                match self.expire_record(&record, now).await {
                    Ok(RecordOutcome::Expired(points)) => {
                        report.expired += 1;
                        report.points_expired += points;
                    }
                    Ok(RecordOutcome::Cancelled) => report.cancelled += 1,
                    Ok(RecordOutcome::Skipped) => {}
                    Err(e) => {
                        error!("Expiring record {} of user {} failed: {:?}", record.expiration_id, record.user_id, e);
                        report.failed += 1;
                        failed.insert(record.expiration_id);
                    }
                }
            }
        }

        if report.processed() > 0 || report.failed > 0 {
            info!(
                "Expiration sweep: expired={}, cancelled={}, failed={}, points={}",
                report.expired, report.cancelled, report.failed, report.points_expired
            );
        }
        Ok(report)
    }

    /// Debits whatever is still available, up to the scheduled amount. With
    /// nothing left the record is cancelled instead.
    async fn expire_record(&self, record: &PointsExpiration, now: DateTime<Utc>) -> Result<RecordOutcome, Error> {
        let mut uow = self.ledger.begin(record.user_id).await?;

        let mut current = match uow.get_expiration(record.expiration_id).await? {
            Some(e) if e.status == ExpirationStatus::Pending => e,
            _ => return Ok(RecordOutcome::Skipped),
        };

        let available = uow.balance().available_points;
        current.processed_at = Some(now);

        let outcome = if available <= 0 {
            current.status = ExpirationStatus::Cancelled;
            debug!("Expiration {} cancelled: user {} has no points left", current.expiration_id, current.user_id);
            RecordOutcome::Cancelled
        } else {
            let amount = current.points.min(available);
            let source_id = current.expiration_id.to_string();
            self.ledger
                .debit_locked(uow.as_mut(), amount, SourceType::Expiration, Some(&source_id), Some("Points expired"))
                .await?;
            current.points = amount;
            current.status = ExpirationStatus::Expired;
            RecordOutcome::Expired(amount)
        };

        uow.update_expiration(&current).await?;
        uow.commit().await?;
        Ok(outcome)
    }

    pub async fn get_expiring_points(&self, user_id: Uuid, within_days: i64) -> Result<Vec<ExpiringPoints>, Error> {
        self.get_expiring_points_at(user_id, within_days, Utc::now()).await
    }

    /// Pending expiries of one user falling within `within_days` of `now`.
    pub async fn get_expiring_points_at(
        &self,
        user_id: Uuid,
        within_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExpiringPoints>, Error> {
        let until = now + Duration::days(within_days.max(0));
        let pending = self.points_repo.list_pending_expirations(user_id, until).await?;
        Ok(pending
            .into_iter()
            .map(|e| ExpiringPoints {
                points: e.points,
                expire_at: e.expire_at,
                days_left: (e.expire_at - now).num_days().max(0),
            })
            .collect())
    }
}
