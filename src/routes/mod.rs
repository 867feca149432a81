pub mod applications;
pub mod auth;
pub mod dashboard;
pub mod health;
pub mod listings;
pub mod matches;
pub mod me;
pub mod messages;
pub mod profiles;
pub mod saved;
pub mod viewings;

use axum::{
    routing::{get, post, put},
    Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::domain::{Listing, User};
use crate::error::ApiError;

/// Build the router: `/health` plus everything under `/api`
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        .nest("/api", api_router())
}

/// Build the API router with all routes
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/otp/request", post(auth::request_otp))
        .route("/auth/otp/verify", post(auth::verify_otp))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::get_session))
        // Account & profile
        .route("/me", get(me::get_me).patch(me::update_me))
        .route(
            "/me/profile",
            get(profiles::get_my_profile).put(profiles::upsert_my_profile),
        )
        .route("/me/listings", get(listings::my_listings))
        .route("/me/matches", get(matches::my_matches))
        .route("/me/applications", get(applications::my_applications))
        .route("/me/viewings", get(viewings::my_viewings))
        .route("/me/saved", get(saved::my_saved))
        .route(
            "/me/saved/:listing_id",
            put(saved::save_listing).delete(saved::unsave_listing),
        )
        .route("/me/dashboard", get(dashboard::my_dashboard))
        // Listings
        .route(
            "/listings",
            get(listings::search_listings).post(listings::create_listing),
        )
        .route(
            "/listings/:id",
            get(listings::get_listing)
                .patch(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/listings/:id/status", post(listings::change_listing_status))
        .route(
            "/listings/:id/applications",
            post(applications::create_application),
        )
        .route("/listings/:id/viewings", post(viewings::create_viewing))
        // Applications
        .route(
            "/applications/:id/decision",
            post(applications::decide_application),
        )
        .route(
            "/applications/:id/withdraw",
            post(applications::withdraw_application),
        )
        // Messages
        .route("/messages", post(messages::send_message))
        .route("/messages/threads", get(messages::list_threads))
        .route(
            "/messages/threads/:listing_id/:user_id",
            get(messages::get_thread),
        )
        // Viewings
        .route("/viewings/:id/status", post(viewings::change_viewing_status))
}

/// Batch-load listings for decorating list responses.
pub(crate) async fn listings_by_id(
    state: &AppState,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, Listing>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    Ok(state
        .store
        .find_listings(&ids)
        .await?
        .into_iter()
        .map(|l| (l.id, l))
        .collect())
}

/// Batch-load users for decorating list responses.
pub(crate) async fn users_by_id(
    state: &AppState,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, User>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    Ok(state
        .store
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}
