// tablepoints-core/src/cache/mod.rs

pub mod rule_cache;
pub mod level_cache;

pub use rule_cache::RuleStore;
pub use level_cache::LevelStore;
