// tablepoints-core/src/engine/mod.rs
//
// Pure computations: no I/O, no locking. Callers hand in a rule snapshot or
// a level table loaded through the caches.

pub mod levels;
pub mod rules;

pub use levels::LevelTable;
pub use rules::RulesEngine;
