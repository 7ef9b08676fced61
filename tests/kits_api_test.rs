mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

async fn seed_kit_and_instance(app: &TestApp) -> (String, String) {
    let token = app.manager_token();
    let (status, body) = app
        .post(
            "/api/v1/kits",
            &token,
            json!({ "name": "Camera kit", "description": "Body, lenses, tripod" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let kit_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            &format!("/api/v1/kits/{kit_id}/instances"),
            &token,
            json!({ "serial_number": "CAM-001" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let instance_id = body["data"]["id"].as_str().unwrap().to_string();
    (kit_id, instance_id)
}

async fn approved_booking(app: &TestApp) -> String {
    let (status, body) = app
        .post(
            "/api/v1/bookings",
            &app.staff_token(),
            json!({
                "location_id": app.location_id,
                "title": "Corporate gig",
                "start_date": "2026-10-01",
                "duration_minutes": 240,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    id
}

#[tokio::test]
async fn kit_lookup_includes_instances() {
    let app = TestApp::new().await;
    let (kit_id, _) = seed_kit_and_instance(&app).await;

    let (status, body) = app
        .get(&format!("/api/v1/kits/{kit_id}"), &app.staff_token())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["kit"]["name"], "Camera kit");
    let instances = body["data"]["instances"].as_array().unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0]["serial_number"], "CAM-001");
    assert_eq!(instances[0]["status"], "available");
}

#[tokio::test]
async fn assignment_follows_instance_lifecycle() {
    let app = TestApp::new().await;
    let (_, instance_id) = seed_kit_and_instance(&app).await;
    let booking_id = approved_booking(&app).await;
    let token = app.manager_token();

    let (status, body) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/assign"),
            &token,
            json!({ "booking_id": booking_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "assigned");
    assert_eq!(body["data"]["assigned_booking_id"], booking_id.as_str());

    // Already assigned, cannot be assigned again.
    let (status, _) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/assign"),
            &token,
            json!({ "booking_id": booking_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/release"),
            &token,
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "available");
    assert!(body["data"]["assigned_booking_id"].is_null());
}

#[tokio::test]
async fn damaged_release_routes_instance_to_maintenance() {
    let app = TestApp::new().await;
    let (_, instance_id) = seed_kit_and_instance(&app).await;
    let booking_id = approved_booking(&app).await;
    let token = app.manager_token();

    let (status, _) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/assign"),
            &token,
            json!({ "booking_id": booking_id }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/release"),
            &token,
            json!({ "condition": "damaged" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "maintenance");
    assert_eq!(body["data"]["condition"], "damaged");

    // Not back in the pool, so it cannot be assigned.
    let (status, _) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/assign"),
            &token,
            json!({ "booking_id": booking_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn instances_only_attach_to_approved_bookings() {
    let app = TestApp::new().await;
    let (_, instance_id) = seed_kit_and_instance(&app).await;

    let (status, body) = app
        .post(
            "/api/v1/bookings",
            &app.staff_token(),
            json!({
                "location_id": app.location_id,
                "title": "Pending gig",
                "start_date": "2026-10-02",
                "duration_minutes": 60,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let pending_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .post(
            &format!("/api/v1/kits/instances/{instance_id}/assign"),
            &app.manager_token(),
            json!({ "booking_id": pending_id }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_kit_is_not_found() {
    let app = TestApp::new().await;
    let (status, _) = app
        .get(
            &format!("/api/v1/kits/{}", uuid::Uuid::new_v4()),
            &app.staff_token(),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
