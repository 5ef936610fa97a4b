//! Order endpoints: create, update, list, and lifecycle actions
//!
//! Lifecycle actions never read-then-write the status: gating is checked
//! against a snapshot, then the transition itself is a conditional update
//! and zero rows affected surfaces as `OrderInvalidState`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::error::{AppError, ErrorCode};
use shared::models::OrderStatus;
use shared::util::{generate_reference, now_millis};

use crate::auth::AuthUser;
use crate::db::orders::{self, CreateOrder, Order};
use crate::db::{audit, users};
use crate::error::{db_err, is_unique_violation};
use crate::state::AppState;

use super::{ApiResult, page_params};

/// Any party on the order, or an admin
fn is_participant(order: &Order, user: &AuthUser) -> bool {
    user.is_admin()
        || order.customer_id == user.user_id
        || order.merchant_id.as_deref() == Some(user.user_id.as_str())
        || order.driver_id.as_deref() == Some(user.user_id.as_str())
}

fn is_assigned_merchant(order: &Order, user: &AuthUser) -> bool {
    order.merchant_id.as_deref() == Some(user.user_id.as_str())
}

fn is_assigned_driver(order: &Order, user: &AuthUser) -> bool {
    order.driver_id.as_deref() == Some(user.user_id.as_str())
}

/// Accept/reject gate: the assigned merchant or driver, or an admin
fn can_accept_or_reject(order: &Order, user: &AuthUser) -> bool {
    user.is_admin() || is_assigned_merchant(order, user) || is_assigned_driver(order, user)
}

/// Pickup/transit/deliver gate: the assigned driver, or an admin
fn can_manage_delivery(order: &Order, user: &AuthUser) -> bool {
    user.is_admin() || is_assigned_driver(order, user)
}

async fn load_order(state: &AppState, id: &str) -> Result<Order, AppError> {
    orders::find_by_id(&state.pool, id)
        .await
        .map_err(|e| {
            tracing::error!("Order query error: {e}");
            AppError::new(ErrorCode::InternalError)
        })?
        .ok_or_else(|| AppError::new(ErrorCode::OrderNotFound))
}

/// POST /api/orders
#[derive(Deserialize)]
pub struct CreateOrderRequest {
    /// Admin may create on behalf of a customer
    pub customer_id: Option<String>,
    pub merchant_id: Option<String>,
    pub total_amount: i64,
    pub delivery_address: Option<String>,
    pub pickup_address: Option<String>,
    pub confirm_deadline: Option<i64>,
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<Order> {
    if req.total_amount <= 0 {
        return Err(AppError::validation("total_amount must be positive"));
    }

    let customer_id = match req.customer_id {
        Some(id) if user.is_admin() => id,
        Some(id) if id == user.user_id => id,
        Some(_) => {
            return Err(AppError::permission_denied(
                "Only admins may create orders for another customer",
            ));
        }
        None => user.user_id.clone(),
    };

    if !users::exists(&state.pool, &customer_id)
        .await
        .map_err(db_err)?
    {
        return Err(AppError::not_found("Customer"));
    }
    if let Some(ref merchant_id) = req.merchant_id {
        if !users::exists(&state.pool, merchant_id)
            .await
            .map_err(db_err)?
        {
            return Err(AppError::not_found("Merchant"));
        }
    }

    let now = now_millis();
    let id = uuid::Uuid::new_v4().to_string();
    let order_number = generate_reference("ORD");

    let created = orders::create(
        &state.pool,
        &CreateOrder {
            id: &id,
            order_number: &order_number,
            customer_id: &customer_id,
            merchant_id: req.merchant_id.as_deref(),
            total_amount: req.total_amount,
            delivery_address: req.delivery_address.as_deref(),
            pickup_address: req.pickup_address.as_deref(),
            confirm_deadline: req.confirm_deadline,
            now,
        },
    )
    .await;
    if let Err(e) = created {
        if is_unique_violation(&e) {
            return Err(AppError::already_exists("Order number"));
        }
        return Err(db_err(e));
    }

    let detail = serde_json::json!({
        "order_number": order_number,
        "total_amount": req.total_amount,
    });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "order_created",
        "order",
        &id,
        Some(&detail),
        now,
    )
    .await;

    let order = load_order(&state, &id).await?;
    Ok(Json(order))
}

/// GET /api/orders
#[derive(Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Order>> {
    let (per_page, offset) = page_params(query.page, query.per_page);
    let rows = if user.is_admin() {
        orders::list_all(&state.pool, per_page, offset).await
    } else {
        orders::list_for_user(&state.pool, &user.user_id, per_page, offset).await
    }
    .map_err(db_err)?;
    Ok(Json(rows))
}

/// GET /api/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !is_participant(&order, &user) {
        return Err(AppError::new(ErrorCode::OrderNotFound));
    }
    Ok(Json(order))
}

/// PUT /api/orders/:id — field edits while PENDING/CONFIRMED
#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub merchant_id: Option<String>,
    pub driver_id: Option<String>,
    pub delivery_address: Option<String>,
    pub pickup_address: Option<String>,
}

pub async fn update_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateOrderRequest>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;

    let may_edit = user.is_admin() || order.customer_id == user.user_id;
    if !may_edit {
        return Err(AppError::permission_denied("Not your order"));
    }
    // Assignments are an operator concern
    if (req.merchant_id.is_some() || req.driver_id.is_some()) && !user.is_admin() {
        return Err(AppError::admin_required());
    }

    for assignee in [req.merchant_id.as_deref(), req.driver_id.as_deref()]
        .into_iter()
        .flatten()
    {
        if !users::exists(&state.pool, assignee)
            .await
            .map_err(db_err)?
        {
            return Err(AppError::not_found("User"));
        }
    }

    let now = now_millis();
    let rows = orders::update_details(
        &state.pool,
        &id,
        req.merchant_id.as_deref(),
        req.driver_id.as_deref(),
        req.delivery_address.as_deref(),
        req.pickup_address.as_deref(),
        now,
    )
    .await
    .map_err(db_err)?;

    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            "Order can no longer be edited",
        ));
    }

    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        "order_updated",
        "order",
        &id,
        None,
        now,
    )
    .await;

    let order = load_order(&state, &id).await?;
    Ok(Json(order))
}

/// Shared tail for lifecycle actions: audit with before/after and reload
async fn finish_transition(
    state: &AppState,
    user: &AuthUser,
    id: &str,
    action: &str,
    before: &str,
    after: OrderStatus,
    now: i64,
) -> ApiResult<Order> {
    let detail = serde_json::json!({ "from": before, "to": after.as_db() });
    let _ = audit::log(
        &state.pool,
        Some(&user.user_id),
        action,
        "order",
        id,
        Some(&detail),
        now,
    )
    .await;

    let order = load_order(state, id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/accept
pub async fn accept_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !can_accept_or_reject(&order, &user) {
        return Err(AppError::new(ErrorCode::OrderNotAssigned));
    }

    let now = now_millis();
    let rows = orders::accept(&state.pool, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            format!("Order cannot be accepted from status {}", order.status),
        ));
    }

    finish_transition(&state, &user, &id, "order_accepted", &order.status, OrderStatus::Accepted, now).await
}

/// POST /api/orders/:id/reject — clears the rejecting party's assignment
pub async fn reject_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !can_accept_or_reject(&order, &user) {
        return Err(AppError::new(ErrorCode::OrderNotAssigned));
    }

    // Admins clear both sides; a party only clears itself
    let clear_merchant = user.is_admin() || is_assigned_merchant(&order, &user);
    let clear_driver = user.is_admin() || is_assigned_driver(&order, &user);

    let now = now_millis();
    let rows = orders::reject(&state.pool, &id, clear_merchant, clear_driver, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            format!("Order cannot be rejected from status {}", order.status),
        ));
    }

    finish_transition(&state, &user, &id, "order_rejected", &order.status, OrderStatus::Pending, now).await
}

/// POST /api/orders/:id/cancel
pub async fn cancel_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !is_participant(&order, &user) {
        return Err(AppError::permission_denied("Not your order"));
    }
    if order.parsed_status() == Some(OrderStatus::Delivered) {
        return Err(AppError::new(ErrorCode::OrderAlreadyDelivered));
    }

    let now = now_millis();
    let rows = orders::cancel(&state.pool, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            format!("Order cannot be cancelled from status {}", order.status),
        ));
    }

    finish_transition(&state, &user, &id, "order_cancelled", &order.status, OrderStatus::Cancelled, now).await
}

/// POST /api/orders/:id/pickup
pub async fn pickup_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !can_manage_delivery(&order, &user) {
        return Err(AppError::new(ErrorCode::OrderNotAssigned));
    }

    let now = now_millis();
    let rows = orders::pickup(&state.pool, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            format!("Order cannot be picked up from status {}", order.status),
        ));
    }

    finish_transition(&state, &user, &id, "order_picked_up", &order.status, OrderStatus::PickedUp, now).await
}

/// POST /api/orders/:id/transit
pub async fn transit_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !can_manage_delivery(&order, &user) {
        return Err(AppError::new(ErrorCode::OrderNotAssigned));
    }

    let now = now_millis();
    let rows = orders::mark_in_transit(&state.pool, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            format!("Order cannot move to transit from status {}", order.status),
        ));
    }

    finish_transition(&state, &user, &id, "order_in_transit", &order.status, OrderStatus::InTransit, now).await
}

/// POST /api/orders/:id/deliver
pub async fn deliver_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> ApiResult<Order> {
    let order = load_order(&state, &id).await?;
    if !can_manage_delivery(&order, &user) {
        return Err(AppError::new(ErrorCode::OrderNotAssigned));
    }

    let now = now_millis();
    let rows = orders::deliver(&state.pool, &id, now)
        .await
        .map_err(db_err)?;
    if rows == 0 {
        return Err(AppError::with_message(
            ErrorCode::OrderInvalidState,
            format!("Order cannot be delivered from status {}", order.status),
        ));
    }

    finish_transition(&state, &user, &id, "order_delivered", &order.status, OrderStatus::Delivered, now).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::UserRole;

    fn order(customer: &str, merchant: Option<&str>, driver: Option<&str>) -> Order {
        Order {
            id: "o1".into(),
            order_number: "ORD_1_a".into(),
            customer_id: customer.into(),
            merchant_id: merchant.map(String::from),
            driver_id: driver.map(String::from),
            total_amount: 5000,
            status: "PENDING".into(),
            delivery_address: None,
            pickup_address: None,
            accepted_at: None,
            picked_up_at: None,
            delivered_at: None,
            confirm_deadline: None,
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
    fn test_participant_visibility() {
        let o = order("cust", Some("merch"), Some("drv"));
        assert!(is_participant(&o, &user("cust", UserRole::Customer)));
        assert!(is_participant(&o, &user("merch", UserRole::Merchant)));
        assert!(is_participant(&o, &user("drv", UserRole::Driver)));
        assert!(is_participant(&o, &user("someone", UserRole::Admin)));
        assert!(!is_participant(&o, &user("stranger", UserRole::Customer)));
    }

    #[test]
    fn test_accept_gate_requires_assignment() {
        let o = order("cust", Some("merch"), None);
        assert!(can_accept_or_reject(&o, &user("merch", UserRole::Merchant)));
        assert!(can_accept_or_reject(&o, &user("ops", UserRole::Admin)));
        // the customer cannot accept their own order
        assert!(!can_accept_or_reject(&o, &user("cust", UserRole::Customer)));
        // an unassigned merchant cannot accept
        assert!(!can_accept_or_reject(&o, &user("other_merch", UserRole::Merchant)));
    }

    #[test]
    fn test_delivery_gate_is_driver_only() {
        let o = order("cust", Some("merch"), Some("drv"));
        assert!(can_manage_delivery(&o, &user("drv", UserRole::Driver)));
        assert!(can_manage_delivery(&o, &user("ops", UserRole::Admin)));
        assert!(!can_manage_delivery(&o, &user("merch", UserRole::Merchant)));
        assert!(!can_manage_delivery(&o, &user("cust", UserRole::Customer)));
        assert!(!can_manage_delivery(&o, &user("other_drv", UserRole::Driver)));
    }

    #[test]
    fn test_delivery_gate_without_driver() {
        let o = order("cust", Some("merch"), None);
        assert!(!can_manage_delivery(&o, &user("drv", UserRole::Driver)));
        assert!(can_manage_delivery(&o, &user("ops", UserRole::Admin)));
    }
}
