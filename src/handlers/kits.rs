use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::kit_instance::KitCondition;
use crate::errors::ServiceError;
use crate::services::kits::{CreateKitInstanceRequest, CreateKitRequest};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
struct AssignInstanceRequest {
    booking_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
struct ReleaseInstanceRequest {
    condition: Option<KitCondition>,
}

async fn create_kit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateKitRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let kit = state
        .services
        .kits
        .create_kit(auth.organization_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(kit))))
}

async fn get_kit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let kit = state.services.kits.get_kit(auth.organization_id, id).await?;
    Ok(Json(ApiResponse::success(kit)))
}

async fn list_kits(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let kits = state.services.kits.list_kits(auth.organization_id).await?;
    Ok(Json(ApiResponse::success(kits)))
}

async fn create_instance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CreateKitInstanceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let instance = state
        .services
        .kits
        .create_instance(auth.organization_id, id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(instance))))
}

async fn assign_instance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignInstanceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let instance = state
        .services
        .kits
        .assign_instance(auth.organization_id, id, request.booking_id)
        .await?;
    state
        .services
        .audit
        .record(
            auth.organization_id,
            Some(auth.user_id),
            "kit_instance.assigned",
            "kit_instance",
            Some(id),
            Some(json!({ "booking_id": request.booking_id })),
        )
        .await;
    Ok(Json(ApiResponse::success(instance)))
}

async fn release_instance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ReleaseInstanceRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let instance = state
        .services
        .kits
        .release_instance(auth.organization_id, id, request.condition)
        .await?;
    Ok(Json(ApiResponse::success(instance)))
}

pub fn kit_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_kit).get(list_kits))
        .route("/:id", get(get_kit))
        .route("/:id/instances", post(create_instance))
        .route("/instances/:id/assign", post(assign_instance))
        .route("/instances/:id/release", post(release_instance))
}
