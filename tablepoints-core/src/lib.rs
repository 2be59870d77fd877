// src/lib.rs

pub mod db;
pub mod config;
pub mod repositories;
pub mod cache;
pub mod engine;
pub mod services;
pub mod tasks;
pub mod test_utils;

pub use db::Database;
pub use tablepoints_common::error::Error;
pub use tablepoints_common::models;
