use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::ValidatedJson;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::users::{MeResponse, UpdateMeRequest};
use crate::error::ApiError;
use crate::routes::profiles::load_profile;

/// GET /api/me
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = load_profile(&state, auth.user_id).await?;

    Ok(Json(MeResponse {
        user: auth.0.user,
        profile,
    }))
}

/// PATCH /api/me
///
/// Update name, email or language. A taken email is a 409.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedJson(req): ValidatedJson<UpdateMeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut user = auth.0.user;
    req.apply(&mut user);
    state.store.update_user(&user).await?;

    tracing::info!(user_id = %user.id, "Account updated");

    let profile = load_profile(&state, user.id).await?;
    Ok(Json(MeResponse { user, profile }))
}
