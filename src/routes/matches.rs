use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::api::{PageRequest, PaginationMeta, ValidatedQuery};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::matching::{rank, MatchQuery, MatchResult, DEFAULT_MIN_SCORE};
use crate::error::ApiError;
use crate::routes::profiles::load_profile;

#[derive(Debug, Serialize)]
pub struct MatchesResponse {
    pub matches: Vec<MatchResult>,
    pub pagination: PaginationMeta,
}

/// GET /api/me/matches
///
/// Active listings scored against the caller's profile, best first.
pub async fn my_matches(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedQuery(query): ValidatedQuery<MatchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = load_profile(&state, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Complete your profile to see matches"))?;

    let page = PageRequest::new(query.page, query.limit);
    let min_score = query.min_score.unwrap_or(DEFAULT_MIN_SCORE);

    let ranked = rank(&profile, state.store.active_listings().await?, min_score);
    let total = ranked.len() as u64;

    tracing::debug!(user_id = %auth.user_id, min_score, total, "Matches computed");

    Ok(Json(MatchesResponse {
        matches: page.slice(ranked),
        pagination: PaginationMeta::new(page, total),
    }))
}
