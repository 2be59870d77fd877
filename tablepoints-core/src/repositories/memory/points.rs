// File: tablepoints-core/src/repositories/memory/points.rs

use std::collections::HashMap;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use tablepoints_common::models::{
    ExpirationStatus, MemberLevel, NewPointsTransaction, PointsBalance, PointsExpiration,
    PointsRule, PointsTransaction, RedeemedReward, RedemptionStatus, Reward, RuleKey, SourceType,
    TransactionType,
};
use tablepoints_common::traits::repository_traits::{PointsRepository, PointsUnitOfWork};

use crate::Error;

#[derive(Default)]
pub(crate) struct MemoryState {
    pub(crate) locks: DashMap<Uuid, Arc<Mutex<()>>>,
    pub(crate) balances: DashMap<Uuid, PointsBalance>,
    pub(crate) transactions: RwLock<Vec<PointsTransaction>>,
    pub(crate) expirations: RwLock<HashMap<Uuid, PointsExpiration>>,
    pub(crate) rewards: RwLock<HashMap<Uuid, Reward>>,
    pub(crate) redemptions: RwLock<HashMap<Uuid, RedeemedReward>>,
    pub(crate) levels: RwLock<HashMap<Uuid, MemberLevel>>,
    pub(crate) rules: RwLock<HashMap<RuleKey, PointsRule>>,
}

/// In-memory implementation of every repository trait. Cloning shares the
/// underlying tables.
#[derive(Clone, Default)]
pub struct MemoryPointsStore {
    pub(crate) state: Arc<MemoryState>,
}

impl MemoryPointsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces a balance row without going through the ledger.
    pub fn overwrite_balance(&self, balance: PointsBalance) {
        self.state.balances.insert(balance.user_id, balance);
    }

    pub fn balance_snapshot(&self, user_id: Uuid) -> Option<PointsBalance> {
        self.state.balances.get(&user_id).map(|b| b.value().clone())
    }

    pub fn all_transactions(&self, user_id: Uuid) -> Vec<PointsTransaction> {
        self.state
            .transactions
            .read()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn all_expirations(&self, user_id: Uuid) -> Vec<PointsExpiration> {
        let mut list: Vec<PointsExpiration> = self
            .state
            .expirations
            .read()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        list
    }

    pub fn all_redemptions(&self, user_id: Uuid) -> Vec<RedeemedReward> {
        self.state
            .redemptions
            .read()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect()
    }

    fn user_lock(&self, user_id: Uuid) -> Arc<Mutex<()>> {
        self.state
            .locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }
}

fn matches_source(
    t: &PointsTransaction,
    user_id: Uuid,
    tx_type: TransactionType,
    source_type: SourceType,
    source_id: &str,
    description: Option<&str>,
) -> bool {
    t.user_id == user_id
        && t.tx_type == tx_type
        && t.source_type == source_type
        && t.source_id.as_deref() == Some(source_id)
        && description.is_none_or(|d| t.description.as_deref() == Some(d))
}

/// Holds the user's mutex; every write is staged and applied in `commit`.
pub struct MemoryPointsUnitOfWork {
    state: Arc<MemoryState>,
    _guard: OwnedMutexGuard<()>,
    balance: PointsBalance,
    transactions: Vec<PointsTransaction>,
    expirations: HashMap<Uuid, PointsExpiration>,
    redemptions: HashMap<Uuid, RedeemedReward>,
    stock_taken: Vec<Uuid>,
}

impl MemoryPointsUnitOfWork {
    fn apply(self) -> Result<(), Error> {
        let MemoryPointsUnitOfWork {
            state,
            _guard,
            balance,
            transactions,
            expirations,
            redemptions,
            stock_taken,
        } = self;

        if !stock_taken.is_empty() {
            let mut rewards = state.rewards.write();
            for reward_id in &stock_taken {
                let available = rewards
                    .get(reward_id)
                    .map(|r| r.is_active && r.stock > 0)
                    .unwrap_or(false);
                if !available {
                    return Err(Error::RewardUnavailable(reward_id.to_string()));
                }
            }
            let now = Utc::now();
            for reward_id in &stock_taken {
                if let Some(r) = rewards.get_mut(reward_id) {
                    r.stock -= 1;
                    r.updated_at = now;
                }
            }
        }

        state.transactions.write().extend(transactions);
        state.expirations.write().extend(expirations);
        state.redemptions.write().extend(redemptions);
        state.balances.insert(balance.user_id, balance);
        Ok(())
    }
}

#[async_trait]
impl PointsUnitOfWork for MemoryPointsUnitOfWork {
    fn balance(&self) -> &PointsBalance {
        &self.balance
    }

    fn balance_mut(&mut self) -> &mut PointsBalance {
        &mut self.balance
    }

    async fn find_transaction(
        &mut self,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error> {
        let user_id = self.balance.user_id;
        let committed = self
            .state
            .transactions
            .read()
            .iter()
            .find(|t| matches_source(t, user_id, tx_type, source_type, source_id, description))
            .cloned();
        if committed.is_some() {
            return Ok(committed);
        }
        Ok(self
            .transactions
            .iter()
            .find(|t| matches_source(t, user_id, tx_type, source_type, source_id, description))
            .cloned())
    }

    async fn append_transaction(&mut self, new_tx: NewPointsTransaction) -> Result<PointsTransaction, Error> {
        let t = new_tx.into_transaction();
        self.transactions.push(t.clone());
        Ok(t)
    }

    async fn insert_expiration(&mut self, e: &PointsExpiration) -> Result<(), Error> {
        self.expirations.insert(e.expiration_id, e.clone());
        Ok(())
    }

    async fn get_expiration(&mut self, expiration_id: Uuid) -> Result<Option<PointsExpiration>, Error> {
        if let Some(e) = self.expirations.get(&expiration_id) {
            return Ok(Some(e.clone()));
        }
        Ok(self.state.expirations.read().get(&expiration_id).cloned())
    }

    async fn update_expiration(&mut self, e: &PointsExpiration) -> Result<(), Error> {
        self.expirations.insert(e.expiration_id, e.clone());
        Ok(())
    }

    async fn decrement_reward_stock(&mut self, reward_id: Uuid) -> Result<bool, Error> {
        let already_taken = self.stock_taken.iter().filter(|id| **id == reward_id).count() as i32;
        let ok = self
            .state
            .rewards
            .read()
            .get(&reward_id)
            .map(|r| r.is_active && r.stock - already_taken > 0)
            .unwrap_or(false);
        if ok {
            self.stock_taken.push(reward_id);
        }
        Ok(ok)
    }

    async fn insert_redemption(&mut self, rd: &RedeemedReward) -> Result<(), Error> {
        self.redemptions.insert(rd.redemption_id, rd.clone());
        Ok(())
    }

    async fn get_redemption(&mut self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error> {
        if let Some(rd) = self.redemptions.get(&redemption_id) {
            return Ok(Some(rd.clone()));
        }
        Ok(self.state.redemptions.read().get(&redemption_id).cloned())
    }

    async fn update_redemption(&mut self, rd: &RedeemedReward) -> Result<(), Error> {
        self.redemptions.insert(rd.redemption_id, rd.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), Error> {
        (*self).apply()
    }
}

#[async_trait]
impl PointsRepository for MemoryPointsStore {
    async fn begin(&self, user_id: Uuid, default_level: &str) -> Result<Box<dyn PointsUnitOfWork>, Error> {
        let guard = self.user_lock(user_id).lock_owned().await;
        let balance = self
            .state
            .balances
            .get(&user_id)
            .map(|b| b.value().clone())
            .unwrap_or_else(|| PointsBalance::new(user_id, default_level));

        Ok(Box::new(MemoryPointsUnitOfWork {
            state: self.state.clone(),
            _guard: guard,
            balance,
            transactions: Vec::new(),
            expirations: HashMap::new(),
            redemptions: HashMap::new(),
            stock_taken: Vec::new(),
        }))
    }

    async fn get_balance(&self, user_id: Uuid) -> Result<Option<PointsBalance>, Error> {
        Ok(self.state.balances.get(&user_id).map(|b| b.value().clone()))
    }

    async fn find_transaction(
        &self,
        user_id: Uuid,
        tx_type: TransactionType,
        source_type: SourceType,
        source_id: &str,
        description: Option<&str>,
    ) -> Result<Option<PointsTransaction>, Error> {
        Ok(self
            .state
            .transactions
            .read()
            .iter()
            .find(|t| matches_source(t, user_id, tx_type, source_type, source_id, description))
            .cloned())
    }

    async fn list_transactions(&self, user_id: Uuid, limit: i64, offset: i64) -> Result<Vec<PointsTransaction>, Error> {
        let mut list: Vec<PointsTransaction> = self
            .state
            .transactions
            .read()
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_due_expirations(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<PointsExpiration>, Error> {
        let mut list: Vec<PointsExpiration> = self
            .state
            .expirations
            .read()
            .values()
            .filter(|e| e.status == ExpirationStatus::Pending && e.expire_at <= now)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.expire_at.cmp(&b.expire_at));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }

    async fn list_pending_expirations(&self, user_id: Uuid, until: DateTime<Utc>) -> Result<Vec<PointsExpiration>, Error> {
        let mut list: Vec<PointsExpiration> = self
            .state
            .expirations
            .read()
            .values()
            .filter(|e| {
                e.user_id == user_id && e.status == ExpirationStatus::Pending && e.expire_at <= until
            })
            .cloned()
            .collect();
        list.sort_by(|a, b| a.expire_at.cmp(&b.expire_at));
        Ok(list)
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<RedeemedReward>, Error> {
        Ok(self.state.redemptions.read().get(&redemption_id).cloned())
    }

    async fn list_lapsed_redemptions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<RedeemedReward>, Error> {
        let mut list: Vec<RedeemedReward> = self
            .state
            .redemptions
            .read()
            .values()
            .filter(|r| r.status == RedemptionStatus::Unused && r.expire_at <= now)
            .cloned()
            .collect();
        list.sort_by(|a, b| a.expire_at.cmp(&b.expire_at));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }
}
