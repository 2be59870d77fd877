use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

mod server;

#[derive(Parser, Debug, Clone)]
#[command(name = "tablepoints")]
#[command(author, version, about = "Loyalty points ledger: expiration sweeps and anomaly scans")]
pub struct Args {
    /// Postgres connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = "postgres://tablepoints@localhost:5432/tablepoints")]
    pub database_url: String,

    /// Run on the in-memory backend instead of Postgres (nothing is persisted).
    #[arg(long, default_value = "false")]
    pub in_memory: bool,

    #[arg(long, default_value = "false")]
    pub skip_migrations: bool,

    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    pub max_connections: u32,

    /// Seconds between expiration sweeps.
    #[arg(long, env = "POINTS_SWEEP_INTERVAL", default_value_t = 3600)]
    pub sweep_interval_secs: u64,

    /// Seconds between anomaly scans.
    #[arg(long, env = "POINTS_ANOMALY_INTERVAL", default_value_t = 21600)]
    pub anomaly_interval_secs: u64,

    #[arg(long, env = "POINTS_SWEEP_BATCH_SIZE", default_value_t = 500)]
    pub sweep_batch_size: i64,

    /// How long rules and levels are served from cache.
    #[arg(long, env = "POINTS_CACHE_TTL", default_value_t = 300)]
    pub cache_ttl_secs: i64,

    #[arg(long, env = "POINTS_LARGE_EARN_THRESHOLD", default_value_t = 10_000)]
    pub large_earn_threshold: i64,

    #[arg(long, default_value_t = 24)]
    pub large_earn_window_hours: i64,

    /// Max transactions per user per hour before it is flagged.
    #[arg(long, env = "POINTS_BURST_THRESHOLD", default_value_t = 50)]
    pub burst_threshold: i64,

    #[arg(long, env = "POINTS_DAILY_GROWTH_CEILING", default_value_t = 5_000)]
    pub daily_growth_ceiling: i64,

    #[arg(long, env = "POINTS_EXPIRATION_RATIO", default_value_t = 0.5)]
    pub expiration_ratio_threshold: f64,
}

fn init_tracing() {
    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("log bridge not installed: {e}");
    }
    let filter = EnvFilter::from_default_env()
        .add_directive("tablepoints=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(sub)
        .expect("Failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Args::parse();
    info!(
        "tablepoints starting. in_memory={}, sweep_interval={}s, anomaly_interval={}s",
        args.in_memory, args.sweep_interval_secs, args.anomaly_interval_secs
    );

    if let Err(e) = server::run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    Ok(())
}
