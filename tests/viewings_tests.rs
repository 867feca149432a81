//! Booking viewings and moving them through their lifecycle.

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

mod common;
use common::{create_active_listing, create_test_app, login, send, TestUser};

async fn book(app: &axum::Router, seeker: &TestUser, listing: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        &format!("/api/listings/{}/viewings", listing),
        Some(&seeker.token),
        Some(body),
    )
    .await
}

fn tomorrow() -> String {
    (Utc::now() + Duration::days(1)).to_rfc3339()
}

#[tokio::test]
async fn test_booking_validates_time_and_meeting_url() {
    let (app, _) = create_test_app();
    let lister = login(&app, "+972500000401", "LISTER").await;
    let seeker = login(&app, "+972500000402", "SEEKER").await;
    let listing = create_active_listing(&app, &lister, "Rehavia", 3500).await;

    let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
    let (status, body) = book(
        &app,
        &seeker,
        &listing,
        json!({ "scheduledAt": past, "kind": "physical" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["scheduledAt"].is_array());

    let (status, body) = book(
        &app,
        &seeker,
        &listing,
        json!({ "scheduledAt": tomorrow(), "kind": "virtual" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["meetingUrl"].is_array());

    let (status, body) = book(
        &app,
        &seeker,
        &listing,
        json!({
            "scheduledAt": tomorrow(),
            "kind": "virtual",
            "meetingUrl": "https://meet.example.com/abc"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["viewing"]["status"], "pending");
    assert_eq!(body["viewing"]["durationMinutes"], 30);
    assert_eq!(body["viewing"]["listerId"], lister.id.as_str());

    // Listers don't book viewings
    let (status, _) = book(
        &app,
        &lister,
        &listing,
        json!({ "scheduledAt": tomorrow(), "kind": "physical" }),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_viewing_lifecycle() {
    let (app, _) = create_test_app();
    let lister = login(&app, "+972500000403", "LISTER").await;
    let seeker = login(&app, "+972500000404", "SEEKER").await;
    let stranger = login(&app, "+972500000405", "SEEKER").await;
    let listing = create_active_listing(&app, &lister, "Rehavia", 3500).await;

    let (_, body) = book(
        &app,
        &seeker,
        &listing,
        json!({ "scheduledAt": tomorrow(), "kind": "physical", "note": "After work" }),
    )
    .await;
    let id = body["viewing"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/viewings/{}/status", id);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&stranger.token),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&seeker.token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&lister.token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["viewing"]["status"], "confirmed");

    // Still in the future
    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&lister.token),
        Some(json!({ "status": "completed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Reschedule puts it back to pending
    let later = (Utc::now() + Duration::days(3)).to_rfc3339();
    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&seeker.token),
        Some(json!({ "status": "pending", "scheduledAt": later })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["viewing"]["status"], "pending");

    let (status, body) = send(
        &app,
        Method::POST,
        &uri,
        Some(&seeker.token),
        Some(json!({ "status": "pending" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["scheduledAt"].is_array());

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&seeker.token),
        Some(json!({ "status": "cancelled" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        Method::POST,
        &uri,
        Some(&lister.token),
        Some(json!({ "status": "confirmed" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_my_viewings_shows_both_sides_and_filters() {
    let (app, _) = create_test_app();
    let lister = login(&app, "+972500000406", "LISTER").await;
    let seeker = login(&app, "+972500000407", "SEEKER").await;
    let listing = create_active_listing(&app, &lister, "Rehavia", 3500).await;

    book(
        &app,
        &seeker,
        &listing,
        json!({ "scheduledAt": tomorrow(), "kind": "physical" }),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/me/viewings", Some(&lister.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let viewings = body["viewings"].as_array().unwrap();
    assert_eq!(viewings.len(), 1);
    assert_eq!(viewings[0]["counterpartName"], "Test User");
    assert_eq!(viewings[0]["listing"]["id"], listing.as_str());

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/me/viewings?status=confirmed",
        Some(&seeker.token),
        None,
    )
    .await;
    assert!(body["viewings"].as_array().unwrap().is_empty());
}
