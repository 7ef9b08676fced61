use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::entities::booking::BookingStatus;
use crate::errors::ServiceError;
use crate::services::bookings::{BookingFilter, CreateBookingRequest, UpdateBookingRequest};
use crate::{ApiResponse, AppState};

#[derive(Debug, Deserialize)]
struct ListBookingsQuery {
    page: Option<u64>,
    limit: Option<u64>,
    status: Option<String>,
    location_id: Option<Uuid>,
    from: Option<chrono::NaiveDate>,
    to: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ApproveBookingRequest {
    #[serde(default = "default_generate_events")]
    generate_events: bool,
}

fn default_generate_events() -> bool {
    true
}

fn parse_status(raw: &str) -> Result<BookingStatus, ServiceError> {
    raw.parse::<BookingStatus>()
        .map_err(|_| ServiceError::InvalidStatus(format!("Unknown booking status: {raw}")))
}

async fn create_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state
        .services
        .bookings
        .create_booking(auth.organization_id, auth.user_id, request)
        .await?;
    state
        .services
        .audit
        .record(
            auth.organization_id,
            Some(auth.user_id),
            "booking.created",
            "booking",
            Some(booking.id),
            None,
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(booking))))
}

async fn get_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state
        .services
        .bookings
        .get_booking(auth.organization_id, id)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<ListBookingsQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let filter = BookingFilter {
        status: query.status.as_deref().map(parse_status).transpose()?,
        location_id: query.location_id,
        from: query.from,
        to: query.to,
    };
    let page = state
        .services
        .bookings
        .list_bookings(
            auth.organization_id,
            filter,
            query.page.unwrap_or(1).max(1),
            query.limit.unwrap_or(20).clamp(1, 100),
        )
        .await?;
    Ok(Json(ApiResponse::success(page)))
}

async fn update_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBookingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state
        .services
        .bookings
        .update_booking(auth.organization_id, id, request)
        .await?;
    Ok(Json(ApiResponse::success(booking)))
}

async fn approve_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ApproveBookingRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.can_manage() {
        return Err(ServiceError::Forbidden(
            "approving bookings requires a manager role".to_string(),
        ));
    }
    let approval = state
        .services
        .bookings
        .approve_booking(
            auth.organization_id,
            id,
            auth.user_id,
            request.generate_events,
        )
        .await?;
    state
        .services
        .audit
        .record(
            auth.organization_id,
            Some(auth.user_id),
            "booking.approved",
            "booking",
            Some(id),
            Some(json!({ "events_generated": approval.events_generated })),
        )
        .await;
    Ok(Json(ApiResponse::success(approval)))
}

async fn reject_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    if !auth.can_manage() {
        return Err(ServiceError::Forbidden(
            "rejecting bookings requires a manager role".to_string(),
        ));
    }
    let booking = state
        .services
        .bookings
        .reject_booking(auth.organization_id, id, auth.user_id)
        .await?;
    state
        .services
        .audit
        .record(
            auth.organization_id,
            Some(auth.user_id),
            "booking.rejected",
            "booking",
            Some(id),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(booking)))
}

async fn cancel_booking(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let booking = state
        .services
        .bookings
        .cancel_booking(auth.organization_id, id)
        .await?;
    state
        .services
        .audit
        .record(
            auth.organization_id,
            Some(auth.user_id),
            "booking.cancelled",
            "booking",
            Some(id),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(booking)))
}

async fn list_event_instances(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let instances = state
        .services
        .bookings
        .list_event_instances(auth.organization_id, id)
        .await?;
    Ok(Json(ApiResponse::success(instances)))
}

pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_booking).get(list_bookings))
        .route("/:id", get(get_booking).put(update_booking))
        .route("/:id/approve", post(approve_booking))
        .route("/:id/reject", post(reject_booking))
        .route("/:id/cancel", post(cancel_booking))
        .route("/:id/events", get(list_event_instances))
}
