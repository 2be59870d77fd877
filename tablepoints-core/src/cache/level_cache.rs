// File: src/cache/level_cache.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use tablepoints_common::models::MemberLevel;
use tablepoints_common::traits::repository_traits::LevelRepository;

use crate::engine::LevelTable;
use crate::Error;

/// Caches the whole level table; it is small and read on every mutation.
pub struct LevelStore {
    repo: Arc<dyn LevelRepository>,
    cached: RwLock<Option<(Arc<LevelTable>, DateTime<Utc>)>>,
    ttl: Duration,
    fallback_code: String,
}

impl LevelStore {
    pub fn new(repo: Arc<dyn LevelRepository>, ttl: Duration, fallback_code: &str) -> Self {
        Self {
            repo,
            cached: RwLock::new(None),
            ttl,
            fallback_code: fallback_code.to_string(),
        }
    }

    pub async fn table(&self) -> Arc<LevelTable> {
        let cached = self.cached.read().clone();
        if let Some((table, loaded_at)) = &cached {
            if Utc::now().signed_duration_since(*loaded_at) < self.ttl {
                return table.clone();
            }
        }

        match self.repo.list_levels().await {
            Ok(levels) => {
                let table = Arc::new(LevelTable::with_fallback(levels, &self.fallback_code));
                *self.cached.write() = Some((table.clone(), Utc::now()));
                table
            }
            Err(e) => {
                warn!("Failed to load member levels: {:?}", e);
                match cached {
                    Some((table, _)) => table,
                    None => Arc::new(LevelTable::with_fallback(Vec::new(), &self.fallback_code)),
                }
            }
        }
    }

    pub async fn save_level(&self, level: &MemberLevel) -> Result<(), Error> {
        self.repo.upsert_level(level).await?;
        self.invalidate();
        info!("Member level '{}' saved (min_points={})", level.code, level.min_points);
        Ok(())
    }

    pub async fn delete_level(&self, level_id: Uuid) -> Result<(), Error> {
        self.repo.delete_level(level_id).await?;
        self.invalidate();
        Ok(())
    }

    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }
}
