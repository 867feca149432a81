//! Profile routes
//!
//! The seeker's search profile, read through the Redis cache.

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::ValidatedJson;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::profiles::{ProfileView, UpsertProfileRequest};
use crate::domain::Profile;
use crate::error::ApiError;
use crate::services::cache::keys as cache_keys;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: Option<ProfileView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Cache-first profile lookup.
pub(crate) async fn load_profile(
    state: &AppState,
    user_id: Uuid,
) -> Result<Option<Profile>, ApiError> {
    let cache_key = cache_keys::profile(user_id);

    if let Some(cached) = state.cache.get::<Profile>(&cache_key).await {
        tracing::debug!(user_id = %user_id, "Profile cache hit");
        return Ok(Some(cached));
    }

    let profile = state.store.find_profile(user_id).await?;
    if let Some(profile) = &profile {
        state.cache.set(&cache_key, profile).await;
    }
    Ok(profile)
}

/// GET /api/me/profile
pub async fn get_my_profile(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let response = match load_profile(&state, auth.user_id).await? {
        Some(profile) => ProfileResponse {
            profile: Some(profile.into()),
            message: None,
        },
        None => ProfileResponse {
            profile: None,
            message: Some("Profile not found. Please complete your profile.".to_string()),
        },
    };

    Ok(Json(response))
}

/// PUT /api/me/profile
///
/// Create or replace the profile. Invalidates the cached copy.
pub async fn upsert_my_profile(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedJson(req): ValidatedJson<UpsertProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = ProfileView::from(req.into_profile(auth.user_id));

    state
        .store
        .upsert_profile(&view.profile, view.completeness)
        .await?;
    state.cache.delete(&cache_keys::profile(auth.user_id)).await;

    tracing::info!(
        user_id = %auth.user_id,
        completeness = view.completeness,
        "Profile saved"
    );

    Ok(Json(ProfileResponse {
        profile: Some(view),
        message: Some("Profile saved".to_string()),
    }))
}
