// src/repositories/postgres/mod.rs

pub mod rows;
pub mod points;
pub mod levels;
pub mod rules;
pub mod rewards;
pub mod analytics;

pub use points::{PostgresPointsRepository, PgPointsUnitOfWork};
pub use levels::PostgresLevelRepository;
pub use rules::PostgresRuleRepository;
pub use rewards::PostgresRewardRepository;
pub use analytics::PostgresPointsAnalyticsRepository;
