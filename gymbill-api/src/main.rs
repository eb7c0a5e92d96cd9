//! # GymBill API Server
//!
//! HTTP API for GymBill: cash drawer operations, payment registration,
//! enrollment, payables and billing runs, all scoped to the tenant in the
//! caller's bearer token.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p gymbill-api
//! ```

use gymbill_api::app::{build_router, AppState};
use gymbill_api::config::Config;
use gymbill_shared::clock::SystemClock;
use gymbill_shared::db::migrations::run_migrations;
use gymbill_shared::db::pool::{close_pool, create_pool, DatabaseConfig};
use gymbill_shared::store::postgres::PgStore;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gymbill_api=debug,gymbill_shared=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("GymBill API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let pool = create_pool(
        DatabaseConfig::new(config.database.url.clone())
            .with_max_connections(config.database.max_connections),
    )
    .await?;
    run_migrations(&pool).await?;

    let store = Arc::new(PgStore::new(pool.clone()));
    let clock = Arc::new(SystemClock::new(config.billing.timezone));
    let bind_address = config.bind_address();

    let app = build_router(AppState::new(store, clock, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received, draining connections...");
            }
        })
        .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}
