//! Escrow storage and conditional custody transitions

use shared::models::EscrowStatus;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Escrow {
    pub id: String,
    pub order_id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub amount: i64,
    pub status: String,
    pub gateway_escrow_ref: Option<String>,
    pub transaction_ref: Option<String>,
    pub released_at: Option<i64>,
    pub cancelled_at: Option<i64>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Escrow {
    pub fn parsed_status(&self) -> Option<EscrowStatus> {
        EscrowStatus::from_db(&self.status)
    }
}

pub struct CreateEscrow<'a> {
    pub id: &'a str,
    pub order_id: &'a str,
    pub payer_id: &'a str,
    pub payee_id: &'a str,
    pub amount: i64,
    pub transaction_ref: Option<&'a str>,
    pub gateway_escrow_ref: Option<&'a str>,
    pub now: i64,
}

/// Insert a new HELD escrow, guarded by the partial unique index on
/// order_id. Returns rows_affected: 0 means an active escrow already
/// exists for the order — the caller decides whether that is a Conflict
/// (user-initiated) or a no-op (webhook redelivery).
pub async fn create_if_absent(pool: &PgPool, escrow: &CreateEscrow<'_>) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO escrows (id, order_id, payer_id, payee_id, amount, status,
                              transaction_ref, gateway_escrow_ref, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, 'HELD', $6, $7, $8, $8)
         ON CONFLICT (order_id) WHERE deleted_at IS NULL DO NOTHING",
    )
    .bind(escrow.id)
    .bind(escrow.order_id)
    .bind(escrow.payer_id)
    .bind(escrow.payee_id)
    .bind(escrow.amount)
    .bind(escrow.transaction_ref)
    .bind(escrow.gateway_escrow_ref)
    .bind(escrow.now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Escrow>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM escrows WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List escrows where the caller is payer or payee
pub async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    limit: i32,
    offset: i32,
) -> Result<Vec<Escrow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM escrows
         WHERE deleted_at IS NULL AND (payer_id = $1 OR payee_id = $1)
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_all(pool: &PgPool, limit: i32, offset: i32) -> Result<Vec<Escrow>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM escrows WHERE deleted_at IS NULL
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// HELD → RELEASED, stamping released_at. Zero rows means the escrow was
/// not HELD (already released, refunded, or disputed).
///
/// Takes an executor so the caller can pair it with the ledger append in
/// one database transaction.
pub async fn release_if_held<'e>(
    exec: impl sqlx::PgExecutor<'e>,
    id: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE escrows SET status = 'RELEASED', released_at = $2, updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status = 'HELD'",
    )
    .bind(id)
    .bind(now)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// HELD/DISPUTED → REFUNDED, stamping cancelled_at
pub async fn refund_if_refundable<'e>(
    exec: impl sqlx::PgExecutor<'e>,
    id: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE escrows SET status = 'REFUNDED', cancelled_at = $2, updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status IN ('HELD', 'DISPUTED')",
    )
    .bind(id)
    .bind(now)
    .execute(exec)
    .await?;
    Ok(result.rows_affected())
}

/// HELD → DISPUTED
pub async fn dispute_if_held(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE escrows SET status = 'DISPUTED', updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status = 'HELD'",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Admin field edits, blocked once the escrow is terminal
pub async fn update_if_not_terminal(
    pool: &PgPool,
    id: &str,
    gateway_escrow_ref: Option<&str>,
    payee_id: Option<&str>,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE escrows SET
            gateway_escrow_ref = COALESCE($2, gateway_escrow_ref),
            payee_id = COALESCE($3, payee_id),
            updated_at = $4
         WHERE id = $1 AND deleted_at IS NULL AND status NOT IN ('RELEASED', 'REFUNDED')",
    )
    .bind(id)
    .bind(gateway_escrow_ref)
    .bind(payee_id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
