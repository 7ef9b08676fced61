use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::audit::AuditQuery;
use crate::{ApiResponse, AppState};

async fn query_audit_log(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.can_manage() {
        return Err(ServiceError::Forbidden(
            "reading the audit log requires a manager role".to_string(),
        ));
    }
    let page = state
        .services
        .audit
        .query(auth.organization_id, query)
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

pub fn audit_routes() -> Router<AppState> {
    Router::new().route("/", get(query_audit_log))
}
