//! Application state

use sqlx::PgPool;

use crate::config::Config;
use crate::paystack::Gateway;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool — the single source of truth and the
    /// sole serialization point for all ledger state
    pub pool: PgPool,
    /// Paystack API client (bounded timeouts)
    pub gateway: Gateway,
    /// Paystack secret key, used to verify inbound webhook signatures
    pub paystack_secret_key: String,
    /// JWT secret for caller authentication
    pub jwt_secret: String,
    /// Environment name (development | staging | production)
    pub environment: String,
}

impl AppState {
    /// Create a new AppState: connect the pool, run migrations, build clients
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = PgPool::connect(&config.database_url).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let gateway = Gateway::new(
            &config.paystack_secret_key,
            &config.paystack_base_url,
            config.gateway_timeout_secs,
        )?;

        Ok(Self {
            pool,
            gateway,
            paystack_secret_key: config.paystack_secret_key.clone(),
            jwt_secret: config.jwt_secret.clone(),
            environment: config.environment.clone(),
        })
    }
}
