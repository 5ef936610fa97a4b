//! Audit log endpoint (admin)

use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::db::audit;
use crate::state::AppState;

use super::{ApiResult, page_params};

#[derive(Deserialize)]
pub struct AuditQuery {
    pub page: Option<i32>,
    pub per_page: Option<i32>,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
}

/// GET /api/audit-log
pub async fn audit_log(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Vec<audit::AuditEntry>> {
    user.require_admin()?;

    let (per_page, offset) = page_params(query.page, query.per_page);
    let entries = audit::query(
        &state.pool,
        query.entity_type.as_deref(),
        query.entity_id.as_deref(),
        per_page,
        offset,
    )
    .await
    .map_err(|e| {
        tracing::error!("Audit log query error: {e}");
        shared::error::AppError::new(shared::error::ErrorCode::InternalError)
    })?;

    Ok(Json(entries))
}
