//! Transaction ledger storage
//!
//! The ledger is append-mostly: completed and refunded entries are frozen,
//! refunds append a compensating entry. The unique constraint on
//! `reference` is the idempotency anchor for webhook reconciliation.

use shared::models::TransactionStatus;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Transaction {
    pub id: String,
    pub reference: String,
    pub user_id: String,
    pub order_id: Option<String>,
    pub recipient_id: Option<String>,
    pub amount: i64,
    pub net_amount: i64,
    pub currency: String,
    pub tx_type: String,
    pub payment_method: String,
    pub gateway_ref: Option<String>,
    pub gateway_tx_id: Option<String>,
    pub status: String,
    pub metadata: Option<serde_json::Value>,
    pub initiated_at: i64,
    pub completed_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Transaction {
    pub fn parsed_status(&self) -> Option<TransactionStatus> {
        TransactionStatus::from_db(&self.status)
    }
}

pub struct NewTransaction<'a> {
    pub id: &'a str,
    pub reference: &'a str,
    pub user_id: &'a str,
    pub order_id: Option<&'a str>,
    pub recipient_id: Option<&'a str>,
    pub amount: i64,
    pub net_amount: i64,
    pub currency: &'a str,
    pub tx_type: &'a str,
    pub payment_method: &'a str,
    pub status: &'a str,
    pub metadata: Option<&'a serde_json::Value>,
    pub completed_at: Option<i64>,
    pub now: i64,
}

/// Append a ledger entry. A duplicate reference violates the unique
/// constraint and surfaces as an error — never a silent overwrite.
///
/// Takes an executor so money-moving callers can pair the append with the
/// escrow/original-entry transition in one database transaction.
pub async fn insert<'e>(
    exec: impl sqlx::PgExecutor<'e>,
    tx: &NewTransaction<'_>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO transactions (id, reference, user_id, order_id, recipient_id, amount,
                                   net_amount, currency, tx_type, payment_method, status,
                                   metadata, initiated_at, completed_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $13, $13)",
    )
    .bind(tx.id)
    .bind(tx.reference)
    .bind(tx.user_id)
    .bind(tx.order_id)
    .bind(tx.recipient_id)
    .bind(tx.amount)
    .bind(tx.net_amount)
    .bind(tx.currency)
    .bind(tx.tx_type)
    .bind(tx.payment_method)
    .bind(tx.status)
    .bind(tx.metadata)
    .bind(tx.now)
    .bind(tx.completed_at)
    .execute(exec)
    .await?;
    Ok(())
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_reference(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<Transaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE reference = $1")
        .bind(reference)
        .fetch_optional(pool)
        .await
}

/// List entries where the caller is owner or recipient
pub async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    status: Option<&str>,
    tx_type: Option<&str>,
    limit: i32,
    offset: i32,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM transactions
         WHERE (user_id = $1 OR recipient_id = $1)
           AND ($2::text IS NULL OR status = $2)
           AND ($3::text IS NULL OR tx_type = $3)
         ORDER BY created_at DESC LIMIT $4 OFFSET $5",
    )
    .bind(user_id)
    .bind(status)
    .bind(tx_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_all(
    pool: &PgPool,
    status: Option<&str>,
    tx_type: Option<&str>,
    limit: i32,
    offset: i32,
) -> Result<Vec<Transaction>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM transactions
         WHERE ($1::text IS NULL OR status = $1)
           AND ($2::text IS NULL OR tx_type = $2)
         ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(status)
    .bind(tx_type)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// PENDING → COMPLETED by reference, storing gateway ids and the raw event
/// payload in one atomic statement. Zero rows affected means the event was
/// already applied or the transaction moved on — the webhook no-op signal.
pub async fn complete_if_pending(
    pool: &PgPool,
    reference: &str,
    gateway_ref: Option<&str>,
    gateway_tx_id: Option<&str>,
    metadata: Option<&serde_json::Value>,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET status = 'COMPLETED',
            gateway_ref = COALESCE($2, gateway_ref),
            gateway_tx_id = COALESCE($3, gateway_tx_id),
            metadata = COALESCE($4, metadata),
            completed_at = $5,
            updated_at = $5
         WHERE reference = $1 AND status = 'PENDING'",
    )
    .bind(reference)
    .bind(gateway_ref)
    .bind(gateway_tx_id)
    .bind(metadata)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// PENDING → FAILED by reference
pub async fn fail_if_pending(
    pool: &PgPool,
    reference: &str,
    metadata: Option<&serde_json::Value>,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET status = 'FAILED',
            metadata = COALESCE($2, metadata),
            updated_at = $3
         WHERE reference = $1 AND status = 'PENDING'",
    )
    .bind(reference)
    .bind(metadata)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Conditional status move by reference, for transfer webhooks
pub async fn transition_by_reference(
    pool: &PgPool,
    reference: &str,
    expected: &[&str],
    to: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    let result = sqlx::query(
        "UPDATE transactions SET status = $3,
            completed_at = CASE WHEN $3 = 'COMPLETED' THEN $4 ELSE completed_at END,
            updated_at = $4
         WHERE reference = $1 AND status = ANY($2)",
    )
    .bind(reference)
    .bind(&expected)
    .bind(to)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// PENDING → COMPLETED by id, for the user-initiated confirm endpoint
pub async fn confirm_by_id(
    pool: &PgPool,
    id: &str,
    gateway_ref: Option<&str>,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET status = 'COMPLETED',
            gateway_ref = COALESCE($2, gateway_ref),
            completed_at = $3,
            updated_at = $3
         WHERE id = $1 AND status = 'PENDING'",
    )
    .bind(id)
    .bind(gateway_ref)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// COMPLETED → REFUNDED. The original entry keeps its amount untouched;
/// the compensating REFUND entry is appended separately.
pub async fn mark_refunded_if_completed<'e>(
    exec: impl sqlx::PgExecutor<'e>,
    id: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET status = 'REFUNDED', updated_at = $2
         WHERE id = $1 AND status = 'COMPLETED'",
    )
    .bind(id)
    .bind(now)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// Field edits, blocked once the entry is frozen
pub async fn update_if_not_frozen(
    pool: &PgPool,
    id: &str,
    payment_method: Option<&str>,
    metadata: Option<&serde_json::Value>,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE transactions SET
            payment_method = COALESCE($2, payment_method),
            metadata = COALESCE($3, metadata),
            updated_at = $4
         WHERE id = $1 AND status NOT IN ('COMPLETED', 'REFUNDED')",
    )
    .bind(id)
    .bind(payment_method)
    .bind(metadata)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
