use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::accounts::{CreateUserRequest, UpdateUserRoleRequest};
use crate::{ApiResponse, AppState};

async fn get_organization(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let org = state
        .services
        .accounts
        .get_organization(auth.organization_id)
        .await?;
    Ok(Json(ApiResponse::success(org)))
}

async fn create_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.is_admin() {
        return Err(ServiceError::Forbidden(
            "creating users requires an admin role".to_string(),
        ));
    }
    let user = state
        .services
        .accounts
        .create_user(auth.organization_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state
        .services
        .accounts
        .get_user(auth.organization_id, id)
        .await?;
    Ok(Json(ApiResponse::success(user)))
}

async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let users = state
        .services
        .accounts
        .list_users(auth.organization_id)
        .await?;
    Ok(Json(ApiResponse::success(users)))
}

async fn update_user_role(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateUserRoleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.is_admin() {
        return Err(ServiceError::Forbidden(
            "changing roles requires an admin role".to_string(),
        ));
    }
    let role = request.role.clone();
    let user = state
        .services
        .accounts
        .update_user_role(auth.organization_id, id, request)
        .await?;
    state
        .services
        .audit
        .record(
            auth.organization_id,
            Some(auth.user_id),
            "user.role_changed",
            "user",
            Some(id),
            Some(json!({ "role": role })),
        )
        .await;
    Ok(Json(ApiResponse::success(user)))
}

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/organization", get(get_organization))
        .route("/users", post(create_user).get(list_users))
        .route("/users/:id", get(get_user))
        .route("/users/:id/role", put(update_user_role))
}
