// File: tablepoints-core/src/repositories/memory/analytics.rs

use std::collections::HashMap;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use tablepoints_common::models::{PointsBalance, PointsTransaction, TransactionType};
use tablepoints_common::traits::repository_traits::PointsAnalyticsRepository;

use super::points::MemoryPointsStore;
use crate::Error;

fn in_window(t: &PointsTransaction, since: DateTime<Utc>, until: DateTime<Utc>) -> bool {
    t.created_at >= since && t.created_at <= until
}

fn sorted_desc(map: HashMap<Uuid, i64>, above: i64) -> Vec<(Uuid, i64)> {
    let mut list: Vec<(Uuid, i64)> = map.into_iter().filter(|(_, v)| *v > above).collect();
    list.sort_by(|a, b| b.1.cmp(&a.1));
    list
}

#[async_trait]
impl PointsAnalyticsRepository for MemoryPointsStore {
    async fn earn_transactions_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, threshold: i64) -> Result<Vec<PointsTransaction>, Error> {
        let mut list: Vec<PointsTransaction> = self
            .state
            .transactions
            .read()
            .iter()
            .filter(|t| t.tx_type == TransactionType::Earn && in_window(t, since, until) && t.points > threshold)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(list)
    }

    async fn transaction_counts_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, max_count: i64) -> Result<Vec<(Uuid, i64)>, Error> {
        let mut counts: HashMap<Uuid, i64> = HashMap::new();
        for t in self.state.transactions.read().iter().filter(|t| in_window(t, since, until)) {
            *counts.entry(t.user_id).or_insert(0) += 1;
        }
        Ok(sorted_desc(counts, max_count))
    }

    async fn earn_totals_above(&self, since: DateTime<Utc>, until: DateTime<Utc>, max_total: i64) -> Result<Vec<(Uuid, i64)>, Error> {
        let mut totals: HashMap<Uuid, i64> = HashMap::new();
        for t in self
            .state
            .transactions
            .read()
            .iter()
            .filter(|t| t.tx_type == TransactionType::Earn && in_window(t, since, until))
        {
            *totals.entry(t.user_id).or_insert(0) += t.points;
        }
        Ok(sorted_desc(totals, max_total))
    }

    async fn balances_violating_invariant(&self) -> Result<Vec<PointsBalance>, Error> {
        Ok(self
            .state
            .balances
            .iter()
            .filter(|b| !b.value().holds_invariant())
            .map(|b| b.value().clone())
            .collect())
    }

    async fn sum_points(&self, tx_type: TransactionType, since: DateTime<Utc>, until: DateTime<Utc>) -> Result<i64, Error> {
        Ok(self
            .state
            .transactions
            .read()
            .iter()
            .filter(|t| t.tx_type == tx_type && in_window(t, since, until))
            .map(|t| t.points.abs())
            .sum())
    }
}
