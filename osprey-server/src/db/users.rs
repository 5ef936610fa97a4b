//! User lookups
//!
//! User CRUD lives in the identity service; this layer only needs an
//! existence check to validate ledger references before any state change.

use sqlx::PgPool;

pub async fn exists(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}
