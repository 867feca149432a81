//! Phone OTP sign-in, token rotation and bearer authentication.

use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;
use common::{create_test_app, login, send};

const PHONE: &str = "+972501234567";

#[tokio::test]
async fn test_health_reports_memory_store_and_disabled_redis() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["database"], "ok");
    assert_eq!(body["services"]["redis"], "disabled");
}

#[tokio::test]
async fn test_otp_request_rejects_invalid_phone() {
    let (app, _) = create_test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/request",
        None,
        Some(json!({ "phone": "0501234567" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert!(body["error"]["fields"]["phone"].is_array());
}

#[tokio::test]
async fn test_sixth_otp_request_is_rate_limited() {
    let (app, _) = create_test_app();

    for _ in 0..5 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/auth/otp/request",
            None,
            Some(json!({ "phone": PHONE })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/request",
        None,
        Some(json!({ "phone": PHONE })),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_new_user_is_sent_to_onboarding_then_to_me() {
    let (app, _) = create_test_app();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/request",
        None,
        Some(json!({ "phone": PHONE })),
    )
    .await;
    let code = body["debugOtp"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 6);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/verify",
        None,
        Some(json!({ "phone": PHONE, "otp": code, "name": "Dana" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["redirectTo"], "/onboarding");
    assert_eq!(body["expiresIn"], 900);
    assert_eq!(body["user"]["isNewUser"], true);
    assert_eq!(body["user"]["role"], "SEEKER");
    assert_eq!(body["user"]["verifiedFlags"]["phoneVerified"], true);
    assert!(body["user"]["profile"].is_null());

    let returning = login(&app, PHONE, "SEEKER").await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/auth/session",
        Some(&returning.token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], returning.id.as_str());
    assert!(body["expiresAt"].is_string());
}

#[tokio::test]
async fn test_wrong_code_is_invalid_otp() {
    let (app, _) = create_test_app();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/request",
        None,
        Some(json!({ "phone": PHONE })),
    )
    .await;
    let code = body["debugOtp"].as_str().unwrap();
    let wrong = if code == "123456" { "654321" } else { "123456" };

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/verify",
        None,
        Some(json!({ "phone": PHONE, "otp": wrong })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "INVALID_OTP");
}

#[tokio::test]
async fn test_admin_role_cannot_be_self_assigned() {
    let (app, _) = create_test_app();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/request",
        None,
        Some(json!({ "phone": PHONE })),
    )
    .await;
    let code = body["debugOtp"].as_str().unwrap();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/otp/verify",
        None,
        Some(json!({ "phone": PHONE, "otp": code, "role": "ADMIN" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_protected_route_requires_bearer_token() {
    let (app, _) = create_test_app();

    let (status, body) = send(&app, Method::GET, "/api/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, Method::GET, "/api/me", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_refresh_rotates_and_revokes_old_token() {
    let (app, _) = create_test_app();
    let user = login(&app, PHONE, "SEEKER").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": user.refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_access = body["accessToken"].as_str().unwrap().to_string();

    let (status, _) = send(&app, Method::GET, "/api/me", Some(&new_access), None).await;
    assert_eq!(status, StatusCode::OK);

    // The old refresh token was rotated out
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": user.refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Access tokens are not refresh tokens
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": user.token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_revokes_access_and_refresh_tokens() {
    let (app, _) = create_test_app();
    let user = login(&app, PHONE, "SEEKER").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/logout",
        Some(&user.token),
        Some(json!({ "refreshToken": user.refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = send(&app, Method::GET, "/api/auth/session", Some(&user.token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": user.refresh_token })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
