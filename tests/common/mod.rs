use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use homesprint_backend::config::Settings;
use homesprint_backend::services::sms::LogSms;
use homesprint_backend::services::RedisCache;
use homesprint_backend::store::MemoryStore;
use homesprint_backend::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Create a test app backed by the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    let state = AppState::new(
        Settings::test_default(),
        Arc::new(MemoryStore::new()),
        RedisCache::disabled(),
        Arc::new(LogSms),
    );
    (create_app(state.clone()), state)
}

/// Send one request and return the status and the JSON body (`Null` when empty).
#[allow(dead_code)]
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// A signed-in test user.
#[allow(dead_code)]
pub struct TestUser {
    pub id: String,
    pub token: String,
    pub refresh_token: String,
}

/// Sign in through the OTP flow, using the exposed debug code.
#[allow(dead_code)]
pub async fn login(app: &Router, phone: &str, role: &str) -> TestUser {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/otp/request",
        None,
        Some(json!({ "phone": phone })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "otp request failed: {body}");
    let code = body["debugOtp"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/otp/verify",
        None,
        Some(json!({ "phone": phone, "otp": code, "name": "Test User", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "otp verify failed: {body}");

    TestUser {
        id: body["user"]["id"].as_str().unwrap().to_string(),
        token: body["accessToken"].as_str().unwrap().to_string(),
        refresh_token: body["refreshToken"].as_str().unwrap().to_string(),
    }
}

/// A listing body that passes validation and scores 85% complete.
#[allow(dead_code)]
pub fn listing_body(neighborhood: &str, rent: i32) -> Value {
    json!({
        "type": "room",
        "address": format!("{} 12, Jerusalem", neighborhood),
        "neighborhood": neighborhood,
        "lat": 31.77,
        "lng": 35.21,
        "rent": rent,
        "billsAvg": 300,
        "deposit": 5000,
        "sizeM2": 14,
        "rooms": 1,
        "bathrooms": 1,
        "amenities": ["wifi", "washing machine"],
        "availableFrom": "2025-01-01T00:00:00Z",
        "leaseTermMonths": 12,
        "photos": [
            "https://img.example.com/1.jpg",
            "https://img.example.com/2.jpg",
            "https://img.example.com/3.jpg",
            "https://img.example.com/4.jpg",
            "https://img.example.com/5.jpg"
        ],
        "description": "Bright room in a quiet shared apartment, five minutes from the park \
            and the light rail. Shared kitchen and balcony, friendly flatmates, and \
            plenty of storage space in the hallway."
    })
}

/// Create a listing as `lister` and publish it. Returns the listing id.
#[allow(dead_code)]
pub async fn create_active_listing(
    app: &Router,
    lister: &TestUser,
    neighborhood: &str,
    rent: i32,
) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/listings",
        Some(&lister.token),
        Some(listing_body(neighborhood, rent)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create listing failed: {body}");
    let id = body["listing"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        Method::POST,
        &format!("/api/listings/{}/status", id),
        Some(&lister.token),
        Some(json!({ "status": "active" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "activate listing failed: {body}");
    id
}

/// A complete profile looking for a room in Rehavia, 3000-4500.
#[allow(dead_code)]
pub fn profile_body() -> Value {
    json!({
        "budgetMin": 3000,
        "budgetMax": 4500,
        "moveInEarliest": "2025-01-01T00:00:00Z",
        "moveInLatest": "2025-03-01T00:00:00Z",
        "areas": ["Rehavia", "German Colony"],
        "occupancyType": "room",
        "lifestyle": {
            "smoking": "no",
            "pets": "no",
            "guests": "rarely",
            "cleaning": "flexible",
            "noise": "quiet",
            "religion": "secular"
        },
        "bio": "Quiet graduate student."
    })
}
