//! API routes

pub mod audit;
pub mod escrows;
pub mod health;
pub mod orders;
pub mod paystack_webhook;
pub mod transactions;

use axum::routing::{get, post};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use shared::error::AppError;

use crate::auth::auth_middleware;
use crate::state::AppState;

pub type ApiResult<T> = Result<axum::Json<T>, AppError>;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Authenticated API (JWT via identity provider)
    let api = Router::new()
        // Orders
        .route("/api/orders", post(orders::create_order).get(orders::list_orders))
        .route(
            "/api/orders/{id}",
            get(orders::get_order).put(orders::update_order),
        )
        .route("/api/orders/{id}/accept", post(orders::accept_order))
        .route("/api/orders/{id}/reject", post(orders::reject_order))
        .route("/api/orders/{id}/cancel", post(orders::cancel_order))
        .route("/api/orders/{id}/pickup", post(orders::pickup_order))
        .route("/api/orders/{id}/transit", post(orders::transit_order))
        .route("/api/orders/{id}/deliver", post(orders::deliver_order))
        // Escrows
        .route(
            "/api/escrows",
            post(escrows::create_escrow).get(escrows::list_escrows),
        )
        .route(
            "/api/escrows/{id}",
            get(escrows::get_escrow).put(escrows::update_escrow),
        )
        .route("/api/escrows/{id}/release", post(escrows::release_escrow))
        .route("/api/escrows/{id}/refund", post(escrows::refund_escrow))
        .route("/api/escrows/{id}/dispute", post(escrows::dispute_escrow))
        // Transactions
        .route(
            "/api/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route(
            "/api/transactions/{id}",
            get(transactions::get_transaction).put(transactions::update_transaction),
        )
        .route(
            "/api/transactions/{id}/confirm",
            post(transactions::confirm_transaction),
        )
        .route(
            "/api/transactions/{id}/refund",
            post(transactions::refund_transaction),
        )
        // Audit (admin)
        .route("/api/audit-log", get(audit::audit_log))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Gateway webhook (HMAC-authenticated, raw body)
    let webhook = Router::new().route(
        "/paystack/webhook",
        post(paystack_webhook::handle_webhook),
    );

    Router::new()
        .route("/health", get(health::health_check))
        .merge(webhook)
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Clamp pagination query params the same way everywhere
pub(crate) fn page_params(page: Option<i32>, per_page: Option<i32>) -> (i32, i32) {
    let per_page = per_page.unwrap_or(20).clamp(1, 100);
    let page = page.unwrap_or(1).max(1);
    (per_page, (page - 1) * per_page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_defaults() {
        assert_eq!(page_params(None, None), (20, 0));
    }

    #[test]
    fn test_page_params_clamped() {
        assert_eq!(page_params(Some(0), Some(1000)), (100, 0));
        assert_eq!(page_params(Some(3), Some(10)), (10, 20));
        assert_eq!(page_params(Some(-1), Some(-5)), (1, 0));
    }
}
