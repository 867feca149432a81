//! Saving listings and the role-specific dashboards.

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;

mod common;
use common::{create_active_listing, create_test_app, login, profile_body, send};

#[tokio::test]
async fn test_save_is_idempotent_and_unsave_reports_missing() {
    let (app, _) = create_test_app();
    let lister = login(&app, "+972500000501", "LISTER").await;
    let seeker = login(&app, "+972500000502", "SEEKER").await;
    let listing = create_active_listing(&app, &lister, "Rehavia", 3500).await;
    let uri = format!("/api/me/saved/{}", listing);

    let (status, body) = send(&app, Method::PUT, &uri, Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["saved"]["notifications"], true);

    let (status, body) = send(
        &app,
        Method::PUT,
        &uri,
        Some(&seeker.token),
        Some(json!({ "notifications": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["saved"]["notifications"], false);

    let (status, body) = send(&app, Method::GET, "/api/me/saved", Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let saved = body["saved"].as_array().unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0]["listingId"], listing.as_str());
    assert_eq!(saved[0]["listing"]["neighborhood"], "Rehavia");

    let (status, _) = send(&app, Method::DELETE, &uri, Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_saving_unknown_listing_is_not_found() {
    let (app, _) = create_test_app();
    let seeker = login(&app, "+972500000503", "SEEKER").await;

    let uri = format!("/api/me/saved/{}", uuid::Uuid::new_v4());
    let (status, _) = send(&app, Method::PUT, &uri, Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_seeker_and_lister_dashboards() {
    let (app, _) = create_test_app();
    let lister = login(&app, "+972500000504", "LISTER").await;
    let seeker = login(&app, "+972500000505", "SEEKER").await;
    let listing = create_active_listing(&app, &lister, "Rehavia", 3500).await;

    // A fresh seeker has nothing yet
    let (status, body) = send(&app, Method::GET, "/api/me/dashboard", Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "seeker");
    assert_eq!(body["hasProfile"], false);
    assert_eq!(body["matchCount"], 0);

    send(
        &app,
        Method::PUT,
        "/api/me/profile",
        Some(&seeker.token),
        Some(profile_body()),
    )
    .await;
    send(
        &app,
        Method::PUT,
        &format!("/api/me/saved/{}", listing),
        Some(&seeker.token),
        None,
    )
    .await;
    send(
        &app,
        Method::POST,
        &format!("/api/listings/{}/applications", listing),
        Some(&seeker.token),
        Some(json!({ "message": "I'd love to rent this room from March." })),
    )
    .await;
    send(
        &app,
        Method::POST,
        &format!("/api/listings/{}/viewings", listing),
        Some(&seeker.token),
        Some(json!({
            "scheduledAt": (Utc::now() + Duration::days(2)).to_rfc3339(),
            "kind": "physical"
        })),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/api/messages",
        Some(&seeker.token),
        Some(json!({ "listingId": listing, "recipientId": lister.id, "body": "See you soon" })),
    )
    .await;
    // One public view
    send(&app, Method::GET, &format!("/api/listings/{}", listing), None, None).await;

    let (_, body) = send(&app, Method::GET, "/api/me/dashboard", Some(&seeker.token), None).await;
    assert_eq!(body["kind"], "seeker");
    assert_eq!(body["hasProfile"], true);
    assert_eq!(body["profileCompleteness"], 90);
    assert_eq!(body["savedCount"], 1);
    assert_eq!(body["applications"]["pending"], 1);
    assert_eq!(body["upcomingViewings"].as_array().unwrap().len(), 1);
    assert_eq!(body["matchCount"], 1);
    assert_eq!(body["unreadMessages"], 0);

    let (status, body) = send(&app, Method::GET, "/api/me/dashboard", Some(&lister.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "lister");
    assert_eq!(body["listings"]["total"], 1);
    assert_eq!(body["listings"]["active"], 1);
    assert_eq!(body["totalViews"], 1);
    assert_eq!(body["applications"]["total"], 1);
    assert_eq!(body["upcomingViewings"][0]["counterpartName"], "Test User");
    assert_eq!(body["unreadMessages"], 1);
}
