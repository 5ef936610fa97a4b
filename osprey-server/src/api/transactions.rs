//! Transaction endpoints: create, list, confirm, refund
//!
//! The ledger never mutates historical amounts. A refund freezes the
//! original entry as REFUNDED and appends a second, independent REFUND
//! entry crediting the counterparty.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::{PaymentMethod, TransactionMetadata, TransactionType};
use shared::util::{generate_reference, now_millis};

use crate::auth::AuthUser;
use crate::db::transactions::{self, NewTransaction, Transaction};
use crate::db::{audit, orders, users};
use crate::error::{db_err, is_unique_violation};
use crate::paystack::GatewayTxStatus;
use crate::state::AppState;

use super::{ApiResult, page_params};

fn is_party(tx: &Transaction, user: &AuthUser) -> bool {
    user.is_admin()
        || tx.user_id == user.user_id
        || tx.recipient_id.as_deref() == Some(user.user_id.as_str())
}

async fn load_transaction(state: &AppState, id: &str) -> Result<Transaction, AppError> {
    transactions::find_by_id(&state.pool, id)
        .await
        .map_err(db_err)?
        .ok_or_else(|| AppError::new(ErrorCode::TransactionNotFound))
}

/// POST /api/transactions
#[derive(Deserialize)]
pub struct CreateTransactionRequest {
    /// Admin may record a transaction on behalf of a user
    pub user_id: Option<String>,
    pub order_id: Option<String>,
    pub recipient_id: Option<String>,
    pub amount: i64,
    pub net_amount: Option<i64>,
    pub currency: Option<String>,
    pub tx_type: TransactionType,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub metadata: Option<serde_json::Value>,
}

pub async fn create_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateTransactionRequest>,
) -> ApiResult<Transaction> {
    if req.amount <= 0 {
        return Err(AppError::validation("amount must be positive"));
    }
    let net_amount = req.net_amount.unwrap_or(req.amount);
    if net_amount <= 0 || net_amount > req.amount {
        return Err(AppError::validation(
            "net_amount must be positive and not exceed amount",
        ));
    }

    let owner_id = match req.user_id {
        Some(id) if user.is_admin() || id == user.user_id => id,
        Some(_) => return Err(AppError::admin_required()),
        None => user.user_id.clone(),
    };

    if !users::exists(&state.pool, &owner_id).await.map_err(db_err)? {
        return Err(AppError::not_found("User"));
    }
    if let Some(ref recipient) = req.recipient_id {
        if !users::exists(&state.pool, recipient).await.map_err(db_err)? {
            return Err(AppError::not_found("Recipient"));
        }
    }
    if let Some(ref order_id) = req.order_id {
        if orders::find_by_id(&state.pool, order_id)
            .await
            .map_err(db_err)?
            .is_none()
        {
            return Err(AppError::new(ErrorCode::OrderNotFound));
        }
    }

    let now = now_millis();
    let id = uuid::Uuid::new_v4().to_string();
    let reference = generate_reference("TXN");
    let currency = req.currency.as_deref().unwrap_or("NGN");

    let result = transactions::insert(
        &state.pool,
        &NewTransaction {
            id: &id,
            reference: &reference,
            user_id: &owner_id,
            order_id: req.order_id.as_deref(),
            recipient_id: req.recipient_id.as_deref(),
            amount: req.amount,
            net_amount,
            currency,
            tx_type: req.tx_type.as_db(),
            payment_method: req.payment_method.as_db(),
            status: "PENDING",
            metadata: req.metadata.as_ref(),
            completed_at: None,
            now,
        },
    )
    .await;

    // The unique constraint is the authority on reference uniqueness
    if let Err(e) = result {
        if is_unique_violation(&e) {
            return Err(AppError::new(ErrorCode::DuplicateReference)
                .with_detail("reference", reference.clone()));
        }
        return Err(db_err(e));
    }

    let detail = serde_json::json!({
        "reference": reference,
        "amount": req.amount,
        "tx_type": req.tx_type.as_db(),
    });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "transaction_created",
        "transaction",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let tx = load_transaction(&state, &id).await?;
    Ok(Json(tx))
}

/// GET /api/transactions
#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub status: Option<String>,
    pub tx_type: Option<String>,
}

pub async fn list_transactions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Transaction>> {
    let (per_page, offset) = page_params(query.page, query.per_page);
    let rows = if user.is_admin() {
        transactions::list_all(
            &state.pool,
            query.status.as_deref(),
            query.tx_type.as_deref(),
            per_page,
            offset,
        )
        .await
    } else {
        transactions::list_for_user(
            &state.pool,
            &user.user_id,
            query.status.as_deref(),
            query.tx_type.as_deref(),
            per_page,
            offset,
        )
        .await
    }
    .map_err(db_err)?;
    Ok(Json(rows))
}

/// GET /api/transactions/:id
pub async fn get_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Transaction> {
    let tx = load_transaction(&state, &id).await?;
    if !is_party(&tx, &user) {
        return Err(AppError::new(ErrorCode::TransactionNotFound));
    }
    Ok(Json(tx))
}

/// PUT /api/transactions/:id — blocked once COMPLETED/REFUNDED
#[derive(Deserialize)]
pub struct UpdateTransactionRequest {
    pub payment_method: Option<PaymentMethod>,
    pub metadata: Option<serde_json::Value>,
}

pub async fn update_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTransactionRequest>,
) -> ApiResult<Transaction> {
    let tx = load_transaction(&state, &id).await?;
    if !is_party(&tx, &user) {
        return Err(AppError::permission_denied("Not your transaction"));
    }
    if tx.parsed_status().is_some_and(|s| s.is_frozen()) {
        return Err(AppError::with_message(
            ErrorCode::TransactionInvalidState,
            format!("Transaction is {} and can no longer be edited", tx.status),
        ));
    }

    let now = now_millis();
    let rows = transactions::update_if_not_frozen(
        &state.pool,
        &id,
        req.payment_method.map(|m| m.as_db()),
        req.metadata.as_ref(),
        now,
    )
    .await
    .map_err(db_err)?;

    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::TransactionInvalidState,
            format!("Transaction is {} and can no longer be edited", tx.status),
        ));
    }

    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "transaction_updated",
        "transaction",
        &id,
        None,
        now,
    )
    .await;

    let tx = load_transaction(&state, &id).await?;
    Ok(Json(tx))
}

/// POST /api/transactions/:id/confirm
#[derive(Deserialize, Default)]
pub struct ConfirmRequest {
    pub gateway_ref: Option<String>,
}

pub async fn confirm_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<ConfirmRequest>,
) -> ApiResult<Transaction> {
    let tx = load_transaction(&state, &id).await?;
    if !is_party(&tx, &user) {
        return Err(AppError::permission_denied("Not your transaction"));
    }

    // A manual confirm of a gateway charge is cross-checked against the
    // gateway first. A timed-out call is a retryable failure, never an
    // assumed success.
    if tx.tx_type == TransactionType::Payment.as_db() {
        match state.gateway.verify_transaction(&tx.reference).await {
            Ok(GatewayTxStatus::Success) => {}
            Ok(GatewayTxStatus::Pending) => {
                return Err(AppError::with_message(
                    ErrorCode::TransactionInvalidState,
                    "Gateway has not confirmed this charge yet",
                ));
            }
            Ok(GatewayTxStatus::Failed) => {
                return Err(AppError::new(ErrorCode::PaymentFailed));
            }
            Err(e) => {
                tracing::warn!(reference = %tx.reference, error = %e, "Gateway verification failed");
                return Err(AppError::new(ErrorCode::GatewayError));
            }
        }
    }

    let now = now_millis();
    let rows = transactions::confirm_by_id(&state.pool, &id, req.gateway_ref.as_deref(), now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::TransactionInvalidState,
            format!("Transaction cannot be confirmed from status {}", tx.status),
        ));
    }

    let detail = serde_json::json!({ "gateway_ref": req.gateway_ref });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "transaction_confirmed",
        "transaction",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let tx = load_transaction(&state, &id).await?;
    Ok(Json(tx))
}

/// POST /api/transactions/:id/refund — admin-only
#[derive(Deserialize)]
pub struct RefundTransactionRequest {
    /// Defaults to the full original amount
    pub amount: Option<i64>,
    pub reason: String,
}

pub async fn refund_transaction(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<RefundTransactionRequest>,
) -> ApiResult<Transaction> {
    user.require_admin()?;
    if req.reason.trim().is_empty() {
        return Err(AppError::validation("A refund reason is required"));
    }

    let tx = load_transaction(&state, &id).await?;

    let refund_amount = req.amount.unwrap_or(tx.amount);
    if refund_amount <= 0 {
        return Err(AppError::validation("Refund amount must be positive"));
    }
    if refund_amount > tx.amount {
        return Err(AppError::new(ErrorCode::RefundExceedsAmount)
            .with_detail("original_amount", tx.amount)
            .with_detail("requested", refund_amount));
    }

    let now = now_millis();
    let reference = generate_reference("TXN");
    let metadata =
        serde_json::to_value(TransactionMetadata::refund(tx.reference.clone(), req.reason.clone()))
            .ok();
    let refund_id = uuid::Uuid::new_v4().to_string();

    // Freeze the original and append the compensating entry crediting the
    // counterparty in one database transaction; the original keeps its
    // amount untouched
    let mut dbtx = state.pool.begin().await.map_err(db_err)?;
    let rows = transactions::mark_refunded_if_completed(&mut *dbtx, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::TransactionInvalidState,
            format!("Transaction cannot be refunded from status {}", tx.status),
        ));
    }
    transactions::insert(
        &mut *dbtx,
        &NewTransaction {
            id: &refund_id,
            reference: &reference,
            user_id: &tx.user_id,
            order_id: tx.order_id.as_deref(),
            recipient_id: Some(&tx.user_id),
            amount: refund_amount,
            net_amount: refund_amount,
            currency: &tx.currency,
            tx_type: TransactionType::Refund.as_db(),
            payment_method: tx.payment_method.as_str(),
            status: "COMPLETED",
            metadata: metadata.as_ref(),
            completed_at: Some(now),
            now,
        },
    )
    .await
    .map_err(db_err)?;
    dbtx.commit().await.map_err(db_err)?;

    let detail = serde_json::json!({
        "refund_of": tx.reference,
        "refund_reference": reference,
        "amount": refund_amount,
        "reason": req.reason,
    });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "transaction_refunded",
        "transaction",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let tx = load_transaction(&state, &id).await?;
    Ok(Json(tx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::UserRole;

    fn tx(owner: &str, recipient: Option<&str>, status: &str) -> Transaction {
        Transaction {
            id: "t1".into(),
            reference: "TXN_1_a".into(),
            user_id: owner.into(),
            order_id: None,
            recipient_id: recipient.map(String::from),
            amount: 5000,
            net_amount: 5000,
            currency: "NGN".into(),
            tx_type: "PAYMENT".into(),
            payment_method: "CARD".into(),
            gateway_ref: None,
            gateway_tx_id: None,
            status: status.into(),
            metadata: None,
            initiated_at: 0,
            completed_at: None,
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
        let t = tx("owner", Some("merchant"), "PENDING");
        assert!(is_party(&t, &user("owner", UserRole::Customer)));
        assert!(is_party(&t, &user("merchant", UserRole::Merchant)));
        assert!(is_party(&t, &user("ops", UserRole::Admin)));
        assert!(!is_party(&t, &user("stranger", UserRole::Customer)));
    }

    #[test]
    fn test_parsed_status() {
        let t = tx("owner", None, "COMPLETED");
        assert_eq!(
            t.parsed_status(),
            Some(shared::models::TransactionStatus::Completed)
        );
        assert!(t.parsed_status().unwrap().is_frozen());
    }
}
