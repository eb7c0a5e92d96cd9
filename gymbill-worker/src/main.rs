//! # GymBill Worker
//!
//! Daily billing worker for GymBill. Marks past-due invoices as overdue and
//! generates recurring membership invoices once per day.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p gymbill-worker
//! ```

use gymbill_shared::clock::SystemClock;
use gymbill_shared::db::migrations::run_migrations;
use gymbill_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use gymbill_shared::store::postgres::PgStore;
use gymbill_worker::config::Config;
use gymbill_worker::jobs::DailyBillingJob;
use gymbill_worker::scheduler::{DailyScheduler, Scheduler};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gymbill_worker=debug,gymbill_shared=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("GymBill Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let clock = Arc::new(SystemClock::new(config.schedule.timezone));

    let scheduler = Arc::new(DailyScheduler::new(
        clock.clone(),
        config.schedule.timezone,
        config.schedule.run_at,
    ));
    scheduler.on_tick(DailyBillingJob::new(store, clock).into_callback());

    if config.schedule.run_on_start {
        tracing::info!("BILLING_RUN_ON_START set, running billing now");
        if let Err(e) = scheduler.trigger_now().await {
            tracing::error!(error = %e, "Startup billing run failed");
        }
    }

    let shutdown = scheduler.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, stopping scheduler...");
            shutdown.cancel();
        }
    });

    scheduler.run().await?;

    close_pool(pool).await;
    tracing::info!("Worker stopped");

    Ok(())
}
