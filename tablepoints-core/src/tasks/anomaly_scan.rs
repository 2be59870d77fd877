// src/tasks/anomaly_scan.rs

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

use tablepoints_common::models::{AnomalyScanParams, Severity};

use crate::services::PointsService;

/// Spawns a periodic anomaly scan. Findings are only logged; nothing is
/// mutated.
pub fn spawn_anomaly_scan_task(
    service: Arc<PointsService>,
    params: AnomalyScanParams,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            match service.anomaly_report(&params).await {
                Ok(found) => {
                    let critical = found.iter().filter(|a| a.severity == Severity::Critical).count();
                    if critical > 0 {
                        warn!("Anomaly scan: {} critical finding(s) out of {}", critical, found.len());
                    }
                }
                Err(e) => error!("Anomaly scan failed: {:?}", e),
            }
        }
    })
}
