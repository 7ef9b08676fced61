pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod message_queue;
pub mod realtime;
pub mod recurrence;
pub mod request_id;
pub mod services;

use axum::{Extension, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::auth::TokenVerifier;
use crate::events::EventSender;
use crate::handlers::AppServices;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: EventSender,
    pub services: AppServices,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: request_id::current_request_id(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_wraps_data() {
        let body = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], 42);
        assert!(body["meta"]["timestamp"].is_string());
    }

    #[test]
    fn error_carries_message_without_data() {
        let body = serde_json::to_value(ApiResponse::<()>::error("oops".into())).unwrap();
        assert_eq!(body["success"], false);
        assert!(body["data"].is_null());
        assert_eq!(body["message"], "oops");
    }
}

/// Versioned API surface.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .nest("/bookings", handlers::bookings::booking_routes())
        .nest("/kits", handlers::kits::kit_routes())
        .nest("/locations", handlers::locations::location_routes())
        .nest("/staff", handlers::staff::staff_routes())
        .nest("/audit", handlers::audit::audit_routes())
        .nest("/accounts", handlers::accounts::account_routes())
}

/// Assembles the full application router. Shared between main and the
/// integration test harness.
pub fn app_router(state: AppState, verifier: TokenVerifier) -> Router {
    Router::new()
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .layer(Extension(verifier))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
