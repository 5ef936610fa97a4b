//! Audit log operations
//!
//! Write-only; entries are never updated. Call sites use
//! `let _ = audit::log(...)` — a failed audit write must never fail the
//! primary operation.

use sqlx::PgPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Write an audit log entry
pub async fn log(
    pool: &PgPool,
    user_id: Option<&str>,
    action: &str,
    entity_type: &str,
    entity_id: &str,
    detail: Option<&serde_json::Value>,
    now: i64,
) -> Result<(), BoxError> {
    sqlx::query(
        "INSERT INTO audit_logs (user_id, action, entity_type, entity_id, detail, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(user_id)
    .bind(action)
    .bind(entity_type)
    .bind(entity_id)
    .bind(detail)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Query audit log entries (paginated, newest first)
#[derive(sqlx::FromRow, serde::Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub user_id: Option<String>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: String,
    pub detail: Option<serde_json::Value>,
    pub created_at: i64,
}

pub async fn query(
    pool: &PgPool,
    entity_type: Option<&str>,
    entity_id: Option<&str>,
    limit: i32,
    offset: i32,
) -> Result<Vec<AuditEntry>, BoxError> {
    let rows: Vec<AuditEntry> = sqlx::query_as(
        "SELECT id, user_id, action, entity_type, entity_id, detail, created_at
         FROM audit_logs
         WHERE ($1::text IS NULL OR entity_type = $1)
           AND ($2::text IS NULL OR entity_id = $2)
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(entity_type)
    .bind(entity_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
