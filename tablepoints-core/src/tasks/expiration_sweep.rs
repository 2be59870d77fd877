// src/tasks/expiration_sweep.rs

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::services::{ExpirationSweepReport, PointsService};
use crate::Error;

/// Spawns the periodic sweep: expires due points, then refunds lapsed
/// redemptions. Failures are logged and the loop keeps going.
pub fn spawn_expiration_task(
    service: Arc<PointsService>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = run_expiration_sweep(&service).await {
                error!("Points expiration sweep failed: {:?}", e);
            }
        }
    })
}

pub async fn run_expiration_sweep(service: &PointsService) -> Result<ExpirationSweepReport, Error> {
    let report = service.check_and_expire_points().await?;

    match service.refund_lapsed_redemptions().await {
        Ok(0) => {}
        Ok(n) => info!("Refunded {} lapsed redemption(s)", n),
        Err(e) => error!("Refunding lapsed redemptions failed: {:?}", e),
    }
    Ok(report)
}
