mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::TestApp;

async fn create_booking(app: &TestApp, recurrence: Option<&str>) -> serde_json::Value {
    let token = app.staff_token();
    let (status, body) = app
        .post(
            "/api/v1/bookings",
            &token,
            json!({
                "location_id": app.location_id,
                "title": "Harbour shoot",
                "start_date": "2026-09-07",
                "duration_minutes": 120,
                "recurrence_rule": recurrence,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
    body["data"].clone()
}

#[tokio::test]
async fn approval_generates_one_instance_per_occurrence() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, Some("FREQ=WEEKLY;COUNT=4")).await;
    let id = booking["id"].as_str().unwrap();
    assert_eq!(booking["status"], "pending");

    let (status, body) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "approve failed: {body}");
    let approval = &body["data"];
    assert_eq!(approval["booking"]["status"], "approved");
    assert_eq!(approval["events_generated"], 4);
    assert_eq!(approval["first_event"], "2026-09-07");
    assert_eq!(approval["last_event"], "2026-09-28");

    let (status, body) = app
        .get(&format!("/api/v1/bookings/{id}/events"), &app.staff_token())
        .await;
    assert_eq!(status, StatusCode::OK);
    let instances = body["data"].as_array().unwrap();
    assert_eq!(instances.len(), 4);
    assert!(instances.iter().all(|i| i["status"] == "scheduled"));

    // Best-effort fanout lands on the queue shortly after commit.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let published = app.queue.published_messages();
    assert!(
        published.iter().any(|m| m.topic == "bookings.approved"),
        "expected a bookings.approved publish, got {:?}",
        published.iter().map(|m| m.topic.clone()).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn stale_version_edits_are_rejected() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, None).await;
    let id = booking["id"].as_str().unwrap();
    let version = booking["version"].as_i64().unwrap();
    let token = app.staff_token();

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/v1/bookings/{id}"),
            Some(&token),
            Some(json!({ "title": "Harbour shoot (rescheduled)", "version": version })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "first edit failed: {body}");
    assert_eq!(body["data"]["version"].as_i64().unwrap(), version + 1);

    // A second writer still holding the original version loses: the update
    // predicate matches zero rows.
    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/bookings/{id}"),
            Some(&token),
            Some(json!({ "title": "Harbour shoot (double-booked)", "version": version })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app.get(&format!("/api/v1/bookings/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Harbour shoot (rescheduled)");
}

#[tokio::test]
async fn approval_can_skip_event_generation() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, Some("FREQ=DAILY;COUNT=10")).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({ "generate_events": false }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events_generated"], 0);

    let (_, body) = app
        .get(&format!("/api/v1/bookings/{id}/events"), &app.staff_token())
        .await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_rule_degrades_to_single_instance() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, Some("FREQ=FORTNIGHTLY;COUNT=banana")).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events_generated"], 1);
    assert_eq!(body["data"]["first_event"], "2026-09-07");
}

#[tokio::test]
async fn booking_without_rule_generates_exactly_one_instance() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, None).await;
    let id = booking["id"].as_str().unwrap();

    let (status, body) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["events_generated"], 1);
}

#[tokio::test]
async fn approval_requires_pending_status() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, None).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Second approval hits the status guard.
    let (status, body) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn staff_cannot_approve() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, None).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.staff_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(Method::GET, "/api/v1/bookings", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cancelled_booking_cannot_be_approved() {
    let app = TestApp::new().await;
    let booking = create_booking(&app, None).await;
    let id = booking["id"].as_str().unwrap();

    let (status, _) = app
        .post(
            &format!("/api/v1/bookings/{id}/cancel"),
            &app.staff_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .post(
            &format!("/api/v1/bookings/{id}/approve"),
            &app.manager_token(),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
