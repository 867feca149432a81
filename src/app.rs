use axum::{
    body::Body,
    http::{HeaderValue, Request},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowHeaders, AllowMethods, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::TokenIssuer;
use crate::config::Settings;
use crate::middleware::{request_id_layer, RequestIdExt};
use crate::routes;
use crate::services::{OtpService, RedisCache, SmsSender};
use crate::store::Store;

/// Request bodies above this size are rejected with 413
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub settings: Settings,
    pub cache: RedisCache,
    pub tokens: TokenIssuer,
    pub otp: OtpService,
}

impl AppState {
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        cache: RedisCache,
        sms: Arc<dyn SmsSender>,
    ) -> Arc<Self> {
        let tokens = TokenIssuer::new(&settings);
        let otp = OtpService::new(&settings, store.clone(), sms);
        Arc::new(Self {
            store,
            settings,
            cache,
            tokens,
            otp,
        })
    }
}

/// Build the complete application with all middleware
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::debug_span!(
                "request",
                method = %request.method(),
                uri = %request.uri(),
                request_id = request.headers().request_id().unwrap_or("-"),
            )
        })
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let (set_request_id, propagate_request_id) = request_id_layer();

    Router::new()
        .merge(routes::router())
        // Middleware stack (applied bottom-up)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(propagate_request_id)
        .layer(trace_layer)
        .layer(set_request_id)
        .layer(cors)
        .with_state(state)
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors_allow_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let max_age = if settings.env.is_dev() {
        std::time::Duration::from_secs(86400)
    } else {
        std::time::Duration::from_secs(3600)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(AllowMethods::list([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::PATCH,
            axum::http::Method::DELETE,
            axum::http::Method::OPTIONS,
        ]))
        .allow_headers(AllowHeaders::list([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            crate::middleware::REQUEST_ID_HEADER,
        ]))
        .allow_credentials(true)
        .max_age(max_age)
}
