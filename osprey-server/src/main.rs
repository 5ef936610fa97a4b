//! osprey-server — marketplace escrow backend
//!
//! Long-running service that:
//! - Holds order-linked funds in escrow until delivery resolves
//! - Maintains an append-only transaction ledger
//! - Reconciles asynchronous Paystack webhook events exactly once
//! - Exposes the order/escrow/transaction API (JWT authenticated)

mod api;
mod auth;
mod config;
mod db;
mod error;
mod paystack;
mod state;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "osprey_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting osprey-server (env: {})", config.environment);

    // Initialize application state (pool + migrations + gateway client)
    let state = AppState::new(&config).await?;

    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("osprey-server listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
