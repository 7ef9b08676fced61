use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::staff::AssignStaffRequest;
use crate::{ApiResponse, AppState};

async fn assign_staff(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
    Json(request): Json<AssignStaffRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.can_manage() {
        return Err(ServiceError::Forbidden(
            "assigning staff requires a manager role".to_string(),
        ));
    }
    let assignment = state
        .services
        .staff
        .assign(auth.organization_id, booking_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(assignment))))
}

async fn list_assignments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let assignments = state
        .services
        .staff
        .list_for_booking(auth.organization_id, booking_id)
        .await?;
    Ok(Json(ApiResponse::success(assignments)))
}

async fn confirm_assignment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let assignment = state
        .services
        .staff
        .confirm(auth.organization_id, id, auth.user_id)
        .await?;
    Ok(Json(ApiResponse::success(assignment)))
}

async fn decline_assignment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let assignment = state
        .services
        .staff
        .decline(auth.organization_id, id, auth.user_id)
        .await?;
    Ok(Json(ApiResponse::success(assignment)))
}

pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bookings/:id/assignments",
            post(assign_staff).get(list_assignments),
        )
        .route("/assignments/:id/confirm", post(confirm_assignment))
        .route("/assignments/:id/decline", post(decline_assignment))
}
