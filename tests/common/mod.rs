use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use crewdeck_api::{
    app_router,
    auth::{issue_token_for_tests, roles, TokenVerifier},
    cache::{Cache, InMemoryCache},
    config::AppConfig,
    db,
    events,
    handlers::AppServices,
    message_queue::{MessageQueue, MockMessageQueue},
    services::{
        accounts::{CreateOrganizationRequest, CreateUserRequest},
        locations::CreateLocationRequest,
        AccountService, AuditService, BookingService, KitService, LocationService, StaffService,
    },
    AppState,
};

const TEST_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Full application wired to an in-memory sqlite database and a capture-only
/// message queue.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub queue: Arc<MockMessageQueue>,
    pub org_id: Uuid,
    pub manager_id: Uuid,
    pub staff_id: Uuid,
    pub location_id: Uuid,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "redis://127.0.0.1:6379".to_string(),
            TEST_SECRET.to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // One pooled connection so every statement sees the same in-memory db.
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = Arc::new(
            db::establish_connection_from_app_config(&cfg)
                .await
                .expect("failed to open test database"),
        );
        db::run_migrations(&pool).await.expect("migrations failed");

        let (event_sender, event_rx) = events::event_channel(64);
        let event_sender = Arc::new(event_sender);
        let queue = Arc::new(MockMessageQueue::new());
        let event_task =
            tokio::spawn(events::process_events(event_rx, queue.clone() as Arc<dyn MessageQueue>));

        let cache = Cache::new(Arc::new(InMemoryCache::new()), Duration::from_secs(60));
        let services = AppServices {
            accounts: Arc::new(AccountService::new(pool.clone())),
            audit: Arc::new(AuditService::new(pool.clone())),
            bookings: Arc::new(BookingService::new(
                pool.clone(),
                event_sender.clone(),
                queue.clone(),
                cfg.booking_tx_max_attempts,
                cfg.event_publish_max_attempts,
                Duration::from_millis(5),
            )),
            kits: Arc::new(KitService::new(pool.clone(), event_sender.clone(), cache)),
            locations: Arc::new(LocationService::new(pool.clone(), event_sender.clone())),
            staff: Arc::new(StaffService::new(pool.clone(), event_sender.clone())),
        };

        let org = services
            .accounts
            .create_organization(CreateOrganizationRequest {
                name: "Test Org".to_string(),
                slug: format!("test-org-{}", Uuid::new_v4().simple()),
            })
            .await
            .expect("seed organization");
        let manager = services
            .accounts
            .create_user(
                org.id,
                CreateUserRequest {
                    email: "manager@example.com".to_string(),
                    display_name: "Morgan Manager".to_string(),
                    role: Some(roles::MANAGER.to_string()),
                },
            )
            .await
            .expect("seed manager");
        let staff = services
            .accounts
            .create_user(
                org.id,
                CreateUserRequest {
                    email: "staff@example.com".to_string(),
                    display_name: "Sam Staff".to_string(),
                    role: Some(roles::STAFF.to_string()),
                },
            )
            .await
            .expect("seed staff");
        let location = services
            .locations
            .create_location(
                org.id,
                CreateLocationRequest {
                    name: "Main Studio".to_string(),
                    address: Some("1 Harbour Way".to_string()),
                    city: None,
                    region: None,
                    timezone: Some("UTC".to_string()),
                },
            )
            .await
            .expect("seed location");

        let state = AppState {
            db: pool,
            config: cfg.clone(),
            event_sender: (*event_sender).clone(),
            services,
        };
        let verifier = TokenVerifier::new(&cfg.jwt_secret, &cfg.jwt_issuer, &cfg.jwt_audience);
        let router = app_router(state.clone(), verifier);

        Self {
            router,
            state,
            queue,
            org_id: org.id,
            manager_id: manager.id,
            staff_id: staff.id,
            location_id: location.id,
            _event_task: event_task,
        }
    }

    pub fn token_for(&self, user_id: Uuid, role: &str) -> String {
        issue_token_for_tests(
            TEST_SECRET,
            &self.state.config.jwt_issuer,
            &self.state.config.jwt_audience,
            user_id,
            self.org_id,
            vec![role.to_string()],
        )
    }

    pub fn manager_token(&self) -> String {
        self.token_for(self.manager_id, roles::MANAGER)
    }

    pub fn staff_token(&self) -> String {
        self.token_for(self.staff_id, roles::STAFF)
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(token), Some(body))
            .await
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }
}
