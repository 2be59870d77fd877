// src/repositories/mod.rs

pub use tablepoints_common::traits::repository_traits::{
    LevelRepository, PointsAnalyticsRepository, PointsRepository, PointsUnitOfWork,
    RewardRepository, RuleRepository,
};

pub use postgres::{
    PostgresLevelRepository, PostgresPointsAnalyticsRepository, PostgresPointsRepository,
    PostgresRewardRepository, PostgresRuleRepository,
};
pub use memory::MemoryPointsStore;

pub mod postgres;
pub mod memory;
