// tablepoints-server/src/server.rs

use std::sync::Arc;
use anyhow::Context;
use tracing::{info, warn};

use tablepoints_common::models::AnomalyScanParams;
use tablepoints_core::Database;
use tablepoints_core::config::{PointsConfig, SchedulerConfig};
use tablepoints_core::repositories::MemoryPointsStore;
use tablepoints_core::services::{PointsBackends, PointsService};
use tablepoints_core::tasks::{spawn_anomaly_scan_task, spawn_expiration_task};

use crate::Args;

fn points_config(args: &Args) -> PointsConfig {
    PointsConfig {
        cache_ttl_secs: args.cache_ttl_secs,
        sweep_batch_size: args.sweep_batch_size,
        ..PointsConfig::default()
    }
}

fn scan_params(args: &Args) -> AnomalyScanParams {
    AnomalyScanParams {
        large_earn_threshold: args.large_earn_threshold,
        large_earn_window_hours: args.large_earn_window_hours,
        burst_threshold: args.burst_threshold,
        daily_growth_ceiling: args.daily_growth_ceiling,
        expiration_ratio_threshold: args.expiration_ratio_threshold,
        ..AnomalyScanParams::default()
    }
}

async fn connect_backends(args: &Args) -> anyhow::Result<PointsBackends> {
    if args.in_memory {
        warn!("Running on the in-memory backend; balances are lost on exit.");
        return Ok(PointsBackends::memory(&MemoryPointsStore::new()));
    }

    let db = Database::new(&args.database_url, args.max_connections)
        .await
        .context("connecting to Postgres")?;
    if args.skip_migrations {
        info!("Skipping migrations (--skip-migrations).");
    } else {
        db.migrate().await.context("applying migrations")?;
    }
    Ok(PointsBackends::postgres(db.pool().clone()))
}

pub async fn run_server(args: Args) -> anyhow::Result<()> {
    let backends = connect_backends(&args).await?;
    let service = Arc::new(PointsService::new(backends, &points_config(&args)));

    let schedule = SchedulerConfig {
        expiration_interval_secs: args.sweep_interval_secs,
        anomaly_interval_secs: args.anomaly_interval_secs,
    };
    let sweep = spawn_expiration_task(service.clone(), schedule.expiration_interval());
    let scan = spawn_anomaly_scan_task(service.clone(), scan_params(&args), schedule.anomaly_interval());
    info!("Background tasks started. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    info!("Shutting down.");
    sweep.abort();
    scan.abort();
    Ok(())
}
