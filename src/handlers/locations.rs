use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::locations::{CreateLocationRequest, UpdateLocationRequest};
use crate::{ApiResponse, AppState};

async fn create_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateLocationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.can_manage() {
        return Err(ServiceError::Forbidden(
            "managing locations requires a manager role".to_string(),
        ));
    }
    let location = state
        .services
        .locations
        .create_location(auth.organization_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(location))))
}

async fn get_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let location = state
        .services
        .locations
        .get_location(auth.organization_id, id)
        .await?;
    Ok(Json(ApiResponse::success(location)))
}

async fn list_locations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let locations = state
        .services
        .locations
        .list_locations(auth.organization_id)
        .await?;
    Ok(Json(ApiResponse::success(locations)))
}

async fn update_location(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateLocationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.can_manage() {
        return Err(ServiceError::Forbidden(
            "managing locations requires a manager role".to_string(),
        ));
    }
    let location = state
        .services
        .locations
        .update_location(auth.organization_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(location)))
}

pub fn location_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_location).get(list_locations))
        .route("/:id", get(get_location).put(update_location))
}
