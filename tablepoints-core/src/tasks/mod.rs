pub mod expiration_sweep;
pub mod anomaly_scan;

pub use expiration_sweep::{run_expiration_sweep, spawn_expiration_task};
pub use anomaly_scan::spawn_anomaly_scan_task;
