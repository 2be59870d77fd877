// src/repositories/memory/mod.rs
//
// Process-local backend with the same locking discipline as Postgres:
// one async mutex per user, table writes applied only on commit.

pub mod points;
pub mod catalog;
pub mod analytics;

pub use points::{MemoryPointsStore, MemoryPointsUnitOfWork};
