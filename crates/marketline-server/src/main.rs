//! Marketline Server — maintenance daemon entry point.
//!
//! Connects to SurrealDB, applies pending migrations, validates the
//! alerting configuration and then sweeps on a fixed interval until
//! Ctrl-C.

mod maintenance;

use marketline_db::{DbConfig, DbError, DbManager, run_migrations};
use marketline_gate::{AlertConfig, ChannelConfig, GateError};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::maintenance::{Maintenance, MaintenanceConfig};

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] GateError),

    #[error("failed to connect to SurrealDB: {0}")]
    Connect(#[from] surrealdb::Error),

    #[error(transparent)]
    Migration(#[from] DbError),
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(
            "marketline=info"
                .parse()
                .unwrap_or_else(|_| tracing::Level::INFO.into()),
        ))
        .json()
        .init();

    info!("Starting Marketline server...");

    if let Err(e) = run().await {
        error!(error = %e, "Marketline server failed");
        std::process::exit(1);
    }

    info!("Marketline server stopped.");
}

async fn run() -> Result<(), StartupError> {
    let alert_config = AlertConfig::from_env()?;
    let channel = ChannelConfig::from_env();
    let maintenance_config = MaintenanceConfig::from_env()?;
    info!(
        crash_free_floor_pct = alert_config.crash_free_floor_pct,
        avg_ms_ceiling = alert_config.avg_ms_ceiling,
        p95_ms_ceiling = alert_config.p95_ms_ceiling,
        cooldown_secs = alert_config.cooldown_secs,
        window_secs = alert_config.window_secs,
        channel_configured = channel.credentials().is_some(),
        "Alerting configuration loaded"
    );

    let db = DbManager::connect(&DbConfig::from_env()).await?;
    run_migrations(db.client()).await?;

    info!(
        interval_secs = maintenance_config.interval_secs,
        metric_retention_secs = maintenance_config.metric_retention_secs,
        "Maintenance loop started"
    );
    Maintenance::new(db.client().clone(), maintenance_config)
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await;

    Ok(())
}
