//! Escrow endpoints: create, list, release, refund, dispute
//!
//! Release and refund are terminal and mutually exclusive. Both are
//! conditional updates; losing the race surfaces as `EscrowInvalidState`,
//! so a double payout is structurally impossible.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{OrderStatus, TransactionMetadata, TransactionType};
use shared::util::{generate_reference, now_millis};

use crate::auth::AuthUser;
use crate::db::escrows::{self, CreateEscrow, Escrow};
use crate::db::transactions::{self, NewTransaction};
use crate::db::{audit, orders, users};
use crate::error::db_err;
use crate::state::AppState;

use super::{ApiResult, page_params};

/// Payer, payee, or admin
fn is_party(escrow: &Escrow, user: &AuthUser) -> bool {
    user.is_admin() || escrow.payer_id == user.user_id || escrow.payee_id == user.user_id
}

async fn load_escrow(state: &AppState, id: &str) -> Result<Escrow, AppError> {
    escrows::find_by_id(&state.pool, id)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::new(ErrorCode::EscrowNotFound))
}

/// POST /api/escrows
#[derive(Deserialize)]
pub struct CreateEscrowRequest {
    pub order_id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub amount: i64,
    pub transaction_ref: Option<String>,
}

pub async fn create_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateEscrowRequest>,
) -> ApiResult<Escrow> {
    if req.amount <= 0 {
        return Err(AppError::validation("amount must be positive"));
    }

    let order = orders::find_by_id(&state.pool, &req.order_id)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;

    // Caller must be admin, the payer, or the order's customer
    let allowed =
        user.is_admin() || req.payer_id == user.user_id || order.customer_id == user.user_id;
    if !allowed {
        return Err(AppError::permission_denied(
            "Only the payer, the order's customer, or an admin may create an escrow",
        ));
    }

    for party in [&req.payer_id, &req.payee_id] {
        if !users::exists(&state.pool, party).await.map_err(db_err)? {
            return Err(AppError::not_found("User"));
        }
    }

    let now = now_millis();
    let id = uuid::Uuid::new_v4().to_string();
    let rows = escrows::create_if_absent(
        &state.pool,
        &CreateEscrow {
            id: &id,
            order_id: &req.order_id,
            payer_id: &req.payer_id,
            payee_id: &req.payee_id,
            amount: req.amount,
            transaction_ref: req.transaction_ref.as_deref(),
            gateway_escrow_ref: None,
            now,
        },
    )
    .await
    .map_err(db_err)?;

    if rows == 0 {
        return Err(AppError::new(ErrorCode::EscrowAlreadyExists)
            .with_detail("order_id", req.order_id.clone()));
    }

    let detail = serde_json::json!({ "order_id": req.order_id, "amount": req.amount });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "escrow_created",
        "escrow",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let escrow = load_escrow(&state, &id).await?;
    Ok(Json(escrow))
}

/// GET /api/escrows
#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
}

pub async fn list_escrows(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Escrow>> {
    let (per_page, offset) = page_params(query.page, query.per_page);
    let rows = if user.is_admin() {
        escrows::list_all(&state.pool, per_page, offset).await
    } else {
        escrows::list_for_user(&state.pool, &user.user_id, per_page, offset).await
    }
    .map_err(db_err)?;
    Ok(Json(rows))
}

/// GET /api/escrows/:id
pub async fn get_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Escrow> {
    let escrow = load_escrow(&state, &id).await?;
    if !is_party(&escrow, &user) {
        return Err(AppError::new(ErrorCode::EscrowNotFound));
    }
    Ok(Json(escrow))
}

/// PUT /api/escrows/:id — admin-only field edits, blocked once terminal
#[derive(Deserialize)]
pub struct UpdateEscrowRequest {
    pub gateway_escrow_ref: Option<String>,
    pub payee_id: Option<String>,
}

pub async fn update_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateEscrowRequest>,
) -> ApiResult<Escrow> {
    user.require_admin()?;
    let escrow = load_escrow(&state, &id).await?;
    if escrow.parsed_status().is_some_and(|s| s.is_terminal()) {
        return Err(AppError::with_message(
            ErrorCode::EscrowInvalidState,
            format!("Escrow is {} and can no longer be edited", escrow.status),
        ));
    }

    if let Some(ref payee) = req.payee_id {
        if !users::exists(&state.pool, payee).await.map_err(db_err)? {
            return Err(AppError::not_found("User"));
        }
    }

    let now = now_millis();
    let rows = escrows::update_if_not_terminal(
        &state.pool,
        &id,
        req.gateway_escrow_ref.as_deref(),
        req.payee_id.as_deref(),
        now,
    )
    .await
    .map_err(db_err)?;

    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::EscrowInvalidState,
            format!("Escrow is {} and can no longer be edited", escrow.status),
        ));
    }

    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "escrow_updated",
        "escrow",
        &id,
        None,
        now,
    )
    .await;

    let escrow = load_escrow(&state, &id).await?;
    Ok(Json(escrow))
}

/// POST /api/escrows/:id/release
#[derive(Deserialize, Default)]
pub struct ReleaseRequest {
    pub reason: Option<String>,
}

pub async fn release_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<ReleaseRequest>,
) -> ApiResult<Escrow> {
    let escrow = load_escrow(&state, &id).await?;

    if !user.is_admin() && escrow.payer_id != user.user_id {
        return Err(AppError::permission_denied(
            "Only the payer or an admin may release an escrow",
        ));
    }

    // Non-admin release requires the delivery condition to be met
    if !user.is_admin() {
        let order = orders::find_by_id(&state.pool, &escrow.order_id)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))?;
        if order.parsed_status() != Some(OrderStatus::Delivered) {
            return Err(AppError::new(ErrorCode::OrderNotDelivered)
                .with_detail("order_status", order.status.clone()));
        }
    }

    let now = now_millis();
    let reference = generate_reference("TXN");
    let reason = req.reason.unwrap_or_else(|| "Escrow release".to_string());
    let tx_id = uuid::Uuid::new_v4().to_string();

    // The custody transition and the payout leg commit together; a dropped
    // transaction rolls both back
    let mut dbtx = state.pool.begin().await.map_err(db_err)?;
    let rows = escrows::release_if_held(&mut *dbtx, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::EscrowInvalidState,
            format!("Escrow cannot be released from status {}", escrow.status),
        ));
    }
    transactions::insert(
        &mut *dbtx,
        &NewTransaction {
            id: &tx_id,
            reference: &reference,
            user_id: &escrow.payee_id,
            order_id: Some(&escrow.order_id),
            recipient_id: Some(&escrow.payee_id),
            amount: escrow.amount,
            net_amount: escrow.amount,
            currency: "NGN",
            tx_type: TransactionType::EscrowRelease.as_db(),
            payment_method: "BANK_TRANSFER",
            status: "PENDING",
            metadata: None,
            completed_at: None,
            now,
        },
    )
    .await
    .map_err(db_err)?;
    dbtx.commit().await.map_err(db_err)?;

    // Best-effort transfer initiation; a timeout is retryable and the
    // ledger entry stays PENDING until the transfer webhook settles it
    if let Err(e) = state
        .gateway
        .initiate_transfer(&escrow.payee_id, escrow.amount, &reference, &reason)
        .await
    {
        tracing::warn!(escrow_id = %id, error = %e, "Transfer initiation failed; awaiting retry/webhook");
    }

    let detail = serde_json::json!({
        "reason": reason,
        "release_reference": reference,
        "amount": escrow.amount,
    });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "escrow_released",
        "escrow",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let escrow = load_escrow(&state, &id).await?;
    Ok(Json(escrow))
}

/// POST /api/escrows/:id/refund — admin-only, reason required
#[derive(Deserialize)]
pub struct RefundRequest {
    pub reason: String,
}

pub async fn refund_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<RefundRequest>,
) -> ApiResult<Escrow> {
    user.require_admin()?;
    if req.reason.trim().is_empty() {
        return Err(AppError::validation("A refund reason is required"));
    }

    let escrow = load_escrow(&state, &id).await?;

    let now = now_millis();
    let reference = generate_reference("TXN");
    let metadata = serde_json::to_value(TransactionMetadata::refund(
        escrow.transaction_ref.clone().unwrap_or_default(),
        req.reason.clone(),
    ))
    .ok();
    let tx_id = uuid::Uuid::new_v4().to_string();

    // Custody transition + compensating entry crediting the payer, atomically
    let mut dbtx = state.pool.begin().await.map_err(db_err)?;
    let rows = escrows::refund_if_refundable(&mut *dbtx, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::EscrowInvalidState,
            format!("Escrow cannot be refunded from status {}", escrow.status),
        ));
    }
    transactions::insert(
        &mut *dbtx,
        &NewTransaction {
            id: &tx_id,
            reference: &reference,
            user_id: &escrow.payer_id,
            order_id: Some(&escrow.order_id),
            recipient_id: Some(&escrow.payer_id),
            amount: escrow.amount,
            net_amount: escrow.amount,
            currency: "NGN",
            tx_type: TransactionType::Refund.as_db(),
            payment_method: "BANK_TRANSFER",
            status: "COMPLETED",
            metadata: metadata.as_ref(),
            completed_at: Some(now),
            now,
        },
    )
    .await
    .map_err(db_err)?;
    dbtx.commit().await.map_err(db_err)?;

    // Ask the gateway to reverse the original charge, if we know it
    if let Some(ref gateway_ref) = escrow.transaction_ref {
        if let Err(e) = state.gateway.refund_charge(gateway_ref, Some(escrow.amount)).await {
            tracing::warn!(escrow_id = %id, error = %e, "Gateway refund failed; operator follow-up required");
        }
    }

    let detail = serde_json::json!({
        "reason": req.reason,
        "refund_reference": reference,
        "amount": escrow.amount,
    });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "escrow_refunded",
        "escrow",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let escrow = load_escrow(&state, &id).await?;
    Ok(Json(escrow))
}

/// POST /api/escrows/:id/dispute
#[derive(Deserialize, Default)]
pub struct DisputeRequest {
    pub reason: Option<String>,
}

pub async fn dispute_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<DisputeRequest>,
) -> ApiResult<Escrow> {
    let escrow = load_escrow(&state, &id).await?;
    if !is_party(&escrow, &user) {
        return Err(AppError::permission_denied(
            "Only the payer, payee, or an admin may dispute an escrow",
        ));
    }

    let now = now_millis();
    let rows = escrows::dispute_if_held(&state.pool, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::EscrowInvalidState,
            format!("Escrow cannot be disputed from status {}", escrow.status),
        ));
    }

    let detail = serde_json::json!({ "reason": req.reason });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "escrow_disputed",
        "escrow",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let escrow = load_escrow(&state, &id).await?;
    Ok(Json(escrow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{EscrowStatus, UserRole};

    fn escrow(payer: &str, payee: &str, status: EscrowStatus) -> Escrow {
        Escrow {
            id: "e1".into(),
            order_id: "o1".into(),
            payer_id: payer.into(),
            payee_id: payee.into(),
            amount: 5000,
            status: status.as_db().into(),
            gateway_escrow_ref: None,
            transaction_ref: Some("TXN_1_a".into()),
            released_at: None,
            cancelled_at: None,
            deleted_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn user(id: &str, role: UserRole) -> AuthUser {
        AuthUser {
            user_id: id.into(),
            role,
        }
    }

    #[test]
    fn test_party_visibility() {
        let e = escrow("payer", "payee", EscrowStatus::Held);
        assert!(is_party(&e, &user("payer", UserRole::Customer)));
        assert!(is_party(&e, &user("payee", UserRole::Merchant)));
        assert!(is_party(&e, &user("ops", UserRole::Admin)));
        assert!(!is_party(&e, &user("stranger", UserRole::Customer)));
    }

    #[test]
    fn test_parsed_status() {
        let e = escrow("payer", "payee", EscrowStatus::Disputed);
        assert_eq!(e.parsed_status(), Some(EscrowStatus::Disputed));
    }
}
