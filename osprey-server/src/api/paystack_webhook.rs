//! Paystack webhook handler
//!
//! POST /paystack/webhook — applies at-least-once gateway events exactly
//! once. Must receive the raw body (not JSON) for HMAC signature
//! verification. Idempotency comes from conditional updates keyed on the
//! transaction reference: zero rows affected means the event was already
//! applied, and the handler answers 200 so the gateway stops redelivering.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

use shared::models::TransactionMetadata;
use shared::util::now_millis;

use crate::db::{audit, escrows, orders, transactions};
use crate::paystack::{self, WebhookEvent};
use crate::state::AppState;

/// Handle incoming Paystack webhook events
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    // 1. Get signature header
    let sig_header = match headers
        .get("x-paystack-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing x-paystack-signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    // 2. Verify signature over the raw body
    if let Err(e) = paystack::verify_webhook_signature(&body, sig_header, &state.paystack_secret_key)
    {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    // 3. Parse JSON envelope
    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::BAD_REQUEST;
        }
    };

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap_or_default();
    tracing::info!(event_type = %event.event, "Received Paystack webhook");

    // 4. Dispatch by event type
    match event.event.as_str() {
        "charge.success" => handle_charge_success(&state, &event, &raw).await,
        "charge.failed" => handle_charge_failed(&state, &event, &raw).await,
        "transfer.success" => {
            handle_transfer(&state, &event, &["PENDING"], "COMPLETED", "transfer_completed").await
        }
        "transfer.failed" => {
            handle_transfer(&state, &event, &["PENDING"], "FAILED", "transfer_failed").await
        }
        "transfer.reversed" => {
            handle_transfer(&state, &event, &["COMPLETED"], "REFUNDED", "transfer_reversed").await
        }
        other => {
            tracing::debug!(event_type = other, "Unhandled webhook event type");
            StatusCode::OK
        }
    }
}

/// charge.success → complete transaction, confirm order, create escrow
async fn handle_charge_success(
    state: &AppState,
    event: &WebhookEvent,
    raw: &serde_json::Value,
) -> StatusCode {
    let reference = match event.data.reference.as_deref() {
        Some(r) => r,
        None => {
            tracing::warn!("charge.success missing reference");
            return StatusCode::OK;
        }
    };

    // Locate the ledger entry for this reference. Absent means no
    // transaction was ever created for it — unmatched, not an error.
    let tx = match transactions::find_by_reference(&state.pool, reference).await {
        Ok(Some(t)) => t,
        Ok(None) => {
            tracing::info!(reference = reference, "Webhook for unknown reference, ignoring");
            let detail = serde_json::json!({ "event": event.event, "outcome": "unmatched" });
            let _ = audit::log(&state.pool, None, "webhook_unmatched", "transaction", reference, Some(&detail), now_millis()).await;
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error locating transaction");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let now = now_millis();
    let gateway_tx_id = event.data.gateway_tx_id();
    let metadata = serde_json::to_value(TransactionMetadata::gateway(
        event.event.clone(),
        gateway_tx_id.clone(),
        raw.clone(),
    ))
    .ok();

    // Idempotent apply: only the PENDING → COMPLETED winner proceeds.
    // Zero rows affected means already applied (or moved on) — skip
    // without error so the gateway stops redelivering.
    let rows = match transactions::complete_if_pending(
        &state.pool,
        reference,
        Some(reference),
        gateway_tx_id.as_deref(),
        metadata.as_ref(),
        now,
    )
    .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(%e, "DB error completing transaction");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    if rows == 0 {
        tracing::info!(reference = reference, "charge.success already applied, skipping");
        let detail = serde_json::json!({ "event": event.event, "outcome": "already_applied" });
        let _ = audit::log(&state.pool, None, "webhook_skipped", "transaction", &tx.id, Some(&detail), now).await;
        return StatusCode::OK;
    }

    // Downstream updates, each idempotent in its own right
    if let Some(ref order_id) = tx.order_id {
        if let Err(e) = orders::confirm_if_pending(&state.pool, order_id, now).await {
            tracing::error!(%e, "DB error confirming order");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }

        match orders::find_by_id(&state.pool, order_id).await {
            Ok(Some(order)) => {
                let payee = order
                    .merchant_id
                    .clone()
                    .or_else(|| tx.recipient_id.clone());
                match payee {
                    Some(payee_id) => {
                        let escrow_id = uuid::Uuid::new_v4().to_string();
                        let created = escrows::create_if_absent(
                            &state.pool,
                            &escrows::CreateEscrow {
                                id: &escrow_id,
                                order_id,
                                payer_id: &tx.user_id,
                                payee_id: &payee_id,
                                amount: tx.amount,
                                transaction_ref: Some(reference),
                                gateway_escrow_ref: gateway_tx_id.as_deref(),
                                now,
                            },
                        )
                        .await;
                        match created {
                            Ok(0) => {
                                tracing::info!(order_id = %order_id, "Escrow already exists, skipping");
                            }
                            Ok(_) => {
                                tracing::info!(order_id = %order_id, escrow_id = %escrow_id, "Escrow created from webhook");
                            }
                            Err(e) => {
                                tracing::error!(%e, "DB error creating escrow");
                                return StatusCode::INTERNAL_SERVER_ERROR;
                            }
                        }
                    }
                    None => {
                        tracing::warn!(order_id = %order_id, "Order has no payee; escrow deferred to assignment");
                    }
                }
            }
            Ok(None) => {
                tracing::warn!(order_id = %order_id, "Transaction references a missing order");
            }
            Err(e) => {
                tracing::error!(%e, "DB error loading order");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        }
    }

    let detail = serde_json::json!({
        "event": event.event,
        "reference": reference,
        "outcome": "applied",
    });
    let _ = audit::log(&state.pool, None, "payment_confirmed", "transaction", &tx.id, Some(&detail), now).await;

    StatusCode::OK
}

/// charge.failed → fail transaction, cancel still-pending order
async fn handle_charge_failed(
    state: &AppState,
    event: &WebhookEvent,
    raw: &serde_json::Value,
) -> StatusCode {
    let reference = match event.data.reference.as_deref() {
        Some(r) => r,
        None => return StatusCode::OK,
    };

    let tx = match transactions::find_by_reference(&state.pool, reference).await {
        Ok(Some(t)) => t,
        Ok(None) => {
            tracing::info!(reference = reference, "Webhook for unknown reference, ignoring");
            let detail = serde_json::json!({ "event": event.event, "outcome": "unmatched" });
            let _ = audit::log(&state.pool, None, "webhook_unmatched", "transaction", reference, Some(&detail), now_millis()).await;
            return StatusCode::OK;
        }
        Err(e) => {
            tracing::error!(%e, "DB error locating transaction");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let now = now_millis();
    let metadata = serde_json::to_value(TransactionMetadata::gateway(
        event.event.clone(),
        event.data.gateway_tx_id(),
        raw.clone(),
    ))
    .ok();

    let rows =
        match transactions::fail_if_pending(&state.pool, reference, metadata.as_ref(), now).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(%e, "DB error failing transaction");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        };

    if rows == 0 {
        tracing::info!(reference = reference, "charge.failed already applied, skipping");
        let detail = serde_json::json!({ "event": event.event, "outcome": "already_applied" });
        let _ = audit::log(&state.pool, None, "webhook_skipped", "transaction", &tx.id, Some(&detail), now).await;
        return StatusCode::OK;
    }

    if let Some(ref order_id) = tx.order_id {
        // Only a still-pending order is cancelled; an order that advanced
        // is left for operator review
        if let Err(e) = orders::cancel_if_pending(&state.pool, order_id, now).await {
            tracing::error!(%e, "DB error cancelling order");
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    }

    let detail = serde_json::json!({
        "event": event.event,
        "reference": reference,
        "outcome": "failed",
    });
    let _ = audit::log(&state.pool, None, "payment_failed", "transaction", &tx.id, Some(&detail), now).await;

    StatusCode::OK
}

/// transfer.* → move the payout leg's status; escrow/order state untouched
async fn handle_transfer(
    state: &AppState,
    event: &WebhookEvent,
    expected: &[&str],
    to: &str,
    action: &str,
) -> StatusCode {
    let reference = match event.data.reference.as_deref() {
        Some(r) => r,
        None => return StatusCode::OK,
    };

    let now = now_millis();
    let rows =
        match transactions::transition_by_reference(&state.pool, reference, expected, to, now).await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(%e, "DB error updating transfer transaction");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        };

    if rows == 0 {
        tracing::info!(
            reference = reference,
            event_type = %event.event,
            "Transfer event did not match a transitionable transaction, ignoring"
        );
        let detail = serde_json::json!({ "event": event.event, "outcome": "no_op" });
        let _ = audit::log(&state.pool, None, "webhook_skipped", "transaction", reference, Some(&detail), now).await;
        return StatusCode::OK;
    }

    let detail = serde_json::json!({ "event": event.event, "reference": reference, "status": to });
    let _ = audit::log(&state.pool, None, action, "transaction", reference, Some(&detail), now).await;

    tracing::info!(reference = reference, status = to, "Transfer transaction updated");
    StatusCode::OK
}
