use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::NoContent;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::saved::{SaveListingRequest, SavedListingView};
use crate::domain::SavedListing;
use crate::error::ApiError;
use crate::routes::listings::fetch_listing;
use crate::routes::listings_by_id;

#[derive(Debug, Serialize)]
pub struct SavedListResponse {
    pub saved: Vec<SavedListingView>,
}

#[derive(Debug, Serialize)]
pub struct SavedResponse {
    pub saved: SavedListing,
    pub message: String,
}

/// GET /api/me/saved
pub async fn my_saved(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let saved = state.store.saved_by_user(auth.user_id).await?;
    let ids: Vec<Uuid> = saved.iter().map(|s| s.listing_id).collect();
    let mut listings = listings_by_id(&state, &ids).await?;

    let saved = saved
        .into_iter()
        .map(|s| SavedListingView {
            listing: listings.remove(&s.listing_id),
            listing_id: s.listing_id,
            notifications: s.notifications,
            saved_at: s.saved_at,
        })
        .collect();

    Ok(Json(SavedListResponse { saved }))
}

/// PUT /api/me/saved/:listing_id
///
/// Idempotent: 201 the first time, 200 afterwards. The body is optional.
pub async fn save_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    body: Option<Json<SaveListingRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    fetch_listing(&state, listing_id).await?;

    let (saved, status) = match state.store.find_saved(auth.user_id, listing_id).await? {
        Some(mut saved) => {
            if let Some(notifications) = req.notifications {
                saved.notifications = notifications;
            }
            (saved, StatusCode::OK)
        }
        None => (
            SavedListing {
                user_id: auth.user_id,
                listing_id,
                notifications: req.notifications.unwrap_or(true),
                saved_at: Utc::now(),
            },
            StatusCode::CREATED,
        ),
    };

    state.store.upsert_saved(&saved).await?;

    if status == StatusCode::CREATED {
        tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Listing saved");
    }

    Ok((
        status,
        Json(SavedResponse {
            saved,
            message: "Listing saved".to_string(),
        }),
    ))
}

/// DELETE /api/me/saved/:listing_id
pub async fn unsave_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.store.delete_saved(auth.user_id, listing_id).await? {
        return Err(ApiError::not_found("Listing is not saved"));
    }

    tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Listing unsaved");

    Ok(NoContent)
}
