// File: src/services/mod.rs

pub mod ledger_service;
pub mod expiration_service;
pub mod redemption_service;
pub mod anomaly_service;
pub mod points_service;

pub use ledger_service::LedgerService;
pub use expiration_service::{ExpirationService, ExpirationSweepReport};
pub use redemption_service::RedemptionService;
pub use anomaly_service::AnomalyDetector;
pub use points_service::{PointsBackends, PointsService};
