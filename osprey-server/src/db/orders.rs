//! Order storage and conditional status transitions

use shared::models::OrderStatus;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Order {
    pub id: String,
    pub order_number: String,
    pub customer_id: String,
    pub merchant_id: Option<String>,
    pub driver_id: Option<String>,
    pub total_amount: i64,
    pub status: String,
    pub delivery_address: Option<String>,
    pub pickup_address: Option<String>,
    pub accepted_at: Option<i64>,
    pub picked_up_at: Option<i64>,
    pub delivered_at: Option<i64>,
    pub confirm_deadline: Option<i64>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    /// Parsed status; unknown strings surface as `None` rather than panic
    pub fn parsed_status(&self) -> Option<OrderStatus> {
        OrderStatus::from_db(&self.status)
    }
}

pub struct CreateOrder<'a> {
    pub id: &'a str,
    pub order_number: &'a str,
    pub customer_id: &'a str,
    pub merchant_id: Option<&'a str>,
    pub total_amount: i64,
    pub delivery_address: Option<&'a str>,
    pub pickup_address: Option<&'a str>,
    pub confirm_deadline: Option<i64>,
    pub now: i64,
}

pub async fn create(pool: &PgPool, order: &CreateOrder<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO orders (id, order_number, customer_id, merchant_id, total_amount, status,
                             delivery_address, pickup_address, confirm_deadline, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $9, $9)",
    )
    .bind(order.id)
    .bind(order.order_number)
    .bind(order.customer_id)
    .bind(order.merchant_id)
    .bind(order.total_amount)
    .bind(order.delivery_address)
    .bind(order.pickup_address)
    .bind(order.confirm_deadline)
    .bind(order.now)
    .execute(pool)
    .await?;
    Ok(())
}

/// Soft-deleted orders are hidden from every active query
pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND deleted_at IS NULL")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List orders visible to a participant (customer, merchant or driver)
pub async fn list_for_user(
    pool: &PgPool,
    user_id: &str,
    limit: i32,
    offset: i32,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders
         WHERE deleted_at IS NULL
           AND (customer_id = $1 OR merchant_id = $1 OR driver_id = $1)
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

pub async fn list_all(pool: &PgPool, limit: i32, offset: i32) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM orders WHERE deleted_at IS NULL
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Field edits, only while the order has not entered fulfilment
pub async fn update_details(
    pool: &PgPool,
    id: &str,
    merchant_id: Option<&str>,
    driver_id: Option<&str>,
    delivery_address: Option<&str>,
    pickup_address: Option<&str>,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET
            merchant_id = COALESCE($2, merchant_id),
            driver_id = COALESCE($3, driver_id),
            delivery_address = COALESCE($4, delivery_address),
            pickup_address = COALESCE($5, pickup_address),
            updated_at = $6
         WHERE id = $1 AND deleted_at IS NULL AND status IN ('PENDING', 'CONFIRMED')",
    )
    .bind(id)
    .bind(merchant_id)
    .bind(driver_id)
    .bind(delivery_address)
    .bind(pickup_address)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// PENDING → CONFIRMED, used by the webhook reconciler after a successful
/// charge. Zero rows affected means the order already advanced — a no-op,
/// not an error.
pub async fn confirm_if_pending(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'CONFIRMED', updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status = 'PENDING'",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// PENDING/CONFIRMED → ACCEPTED, stamping accepted_at
pub async fn accept(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'ACCEPTED', accepted_at = $2, updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status IN ('PENDING', 'CONFIRMED')",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Rejection clears the rejecting party's assignment and returns the order
/// to the pool. Only valid before pickup.
pub async fn reject(
    pool: &PgPool,
    id: &str,
    clear_merchant: bool,
    clear_driver: bool,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'PENDING',
            merchant_id = CASE WHEN $2 THEN NULL ELSE merchant_id END,
            driver_id = CASE WHEN $3 THEN NULL ELSE driver_id END,
            accepted_at = NULL,
            updated_at = $4
         WHERE id = $1 AND deleted_at IS NULL AND status IN ('PENDING', 'CONFIRMED', 'ACCEPTED')",
    )
    .bind(id)
    .bind(clear_merchant)
    .bind(clear_driver)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// ACCEPTED → PICKED_UP, stamping picked_up_at
pub async fn pickup(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'PICKED_UP', picked_up_at = $2, updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status = 'ACCEPTED'",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// PICKED_UP → IN_TRANSIT
pub async fn mark_in_transit(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'IN_TRANSIT', updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status = 'PICKED_UP'",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// PICKED_UP/IN_TRANSIT → DELIVERED, stamping delivered_at
pub async fn deliver(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'DELIVERED', delivered_at = $2, updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status IN ('PICKED_UP', 'IN_TRANSIT')",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Cancel from any non-terminal state
pub async fn cancel(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'CANCELLED', updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status NOT IN ('DELIVERED', 'CANCELLED')",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// Cancel only while still PENDING — the webhook reconciler's path for a
/// failed charge; an order that already advanced is left alone.
pub async fn cancel_if_pending(pool: &PgPool, id: &str, now: i64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE orders SET status = 'CANCELLED', updated_at = $2
         WHERE id = $1 AND deleted_at IS NULL AND status = 'PENDING'",
    )
    .bind(id)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
