//! Account, search profile and match scoring over HTTP.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{create_active_listing, create_test_app, login, profile_body, send};

#[tokio::test]
async fn test_missing_profile_is_reported_not_an_error() {
    let (app, _) = create_test_app();
    let seeker = login(&app, "+972500000101", "SEEKER").await;

    let (status, body) = send(&app, Method::GET, "/api/me/profile", Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["profile"].is_null());
    assert_eq!(
        body["message"],
        "Profile not found. Please complete your profile."
    );
}

#[tokio::test]
async fn test_profile_upsert_computes_completeness() {
    let (app, _) = create_test_app();
    let seeker = login(&app, "+972500000102", "SEEKER").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/me/profile",
        Some(&seeker.token),
        Some(profile_body()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["completeness"], 90);
    assert_eq!(body["profile"]["occupancyType"], "room");

    let (_, body) = send(&app, Method::GET, "/api/me", Some(&seeker.token), None).await;
    assert_eq!(body["user"]["profileCompleteness"], 90);
    assert_eq!(body["profile"]["budgetMax"], 4500);
}

#[tokio::test]
async fn test_profile_cross_field_rules() {
    let (app, _) = create_test_app();
    let seeker = login(&app, "+972500000103", "SEEKER").await;

    let mut body = profile_body();
    body["budgetMin"] = json!(6000);
    body["moveInEarliest"] = json!("2025-06-01T00:00:00Z");
    body["lifestyle"].as_object_mut().unwrap().remove("religion");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/me/profile",
        Some(&seeker.token),
        Some(body),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields = &body["error"]["fields"];
    assert!(fields["budgetMin"].is_array());
    assert!(fields["moveInEarliest"].is_array());
    assert!(fields["lifestyle"].is_array());
}

#[tokio::test]
async fn test_update_me_validates_and_detects_duplicate_email() {
    let (app, _) = create_test_app();
    let first = login(&app, "+972500000104", "SEEKER").await;
    let second = login(&app, "+972500000105", "SEEKER").await;

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/me",
        Some(&first.token),
        Some(json!({ "email": "Dana@Example.com", "lang": "he" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "dana@example.com");
    assert_eq!(body["user"]["lang"], "he");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/me",
        Some(&second.token),
        Some(json!({ "lang": "fr" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["fields"]["lang"].is_array());

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/me",
        Some(&second.token),
        Some(json!({ "email": "dana@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");
}

#[tokio::test]
async fn test_matches_require_a_profile() {
    let (app, _) = create_test_app();
    let seeker = login(&app, "+972500000106", "SEEKER").await;

    let (status, _) = send(&app, Method::GET, "/api/me/matches", Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_matches_are_scored_and_ranked() {
    let (app, _) = create_test_app();
    let lister = login(&app, "+972500000107", "LISTER").await;
    let seeker = login(&app, "+972500000108", "SEEKER").await;

    // In budget, preferred area, room, available in time, no policies: 100
    let best = create_active_listing(&app, &lister, "Rehavia", 3500).await;
    // Below budget in a preferred area: 25 + 25 + 15 + 15 + 10 = 90
    let cheaper = create_active_listing(&app, &lister, "German Colony", 2500).await;
    // Far over budget, elsewhere: 0 + 0 + 15 + 15 + 10 = 40, filtered at the default 50
    create_active_listing(&app, &lister, "Talpiot", 9000).await;

    send(
        &app,
        Method::PUT,
        "/api/me/profile",
        Some(&seeker.token),
        Some(profile_body()),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/api/me/matches", Some(&seeker.token), None).await;
    assert_eq!(status, StatusCode::OK);
    let matches = body["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0]["listing"]["id"], best.as_str());
    assert_eq!(matches[0]["score"], 100);
    assert_eq!(matches[0]["breakdown"]["budget"], 35);
    assert_eq!(matches[1]["listing"]["id"], cheaper.as_str());
    assert_eq!(matches[1]["score"], 90);

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/me/matches?minScore=0",
        Some(&seeker.token),
        None,
    )
    .await;
    assert_eq!(body["pagination"]["total"], 3);

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/me/matches?minScore=101",
        Some(&seeker.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
