//! Viewing schedule: seekers request, listers confirm and complete.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, ValidatedJson, ValidatedQuery};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::viewings::{
    CreateViewingRequest, ViewingQuery, ViewingStatusRequest, ViewingView,
};
use crate::domain::{Role, Viewing};
use crate::error::ApiError;
use crate::routes::listings::fetch_listing;
use crate::routes::{listings_by_id, users_by_id};

#[derive(Debug, Serialize)]
pub struct ViewingResponse {
    pub viewing: Viewing,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ViewingListResponse {
    pub viewings: Vec<ViewingView>,
}

/// Attach listing summaries and the other party's name.
pub(crate) async fn viewing_views(
    state: &AppState,
    user_id: Uuid,
    viewings: Vec<Viewing>,
) -> Result<Vec<ViewingView>, ApiError> {
    let counterpart = |v: &Viewing| {
        if v.seeker_id == user_id {
            v.lister_id
        } else {
            v.seeker_id
        }
    };

    let listing_ids: Vec<Uuid> = viewings.iter().map(|v| v.listing_id).collect();
    let user_ids: Vec<Uuid> = viewings.iter().map(counterpart).collect();
    let (listings, users) = tokio::try_join!(
        listings_by_id(state, &listing_ids),
        users_by_id(state, &user_ids),
    )?;

    Ok(viewings
        .into_iter()
        .map(|viewing| ViewingView {
            listing: listings.get(&viewing.listing_id).map(|l| l.summary()),
            counterpart_name: users
                .get(&counterpart(&viewing))
                .and_then(|u| u.name.clone()),
            viewing,
        })
        .collect())
}

/// POST /api/listings/:id/viewings
pub async fn create_viewing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateViewingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[Role::Seeker])?;

    let listing = fetch_listing(&state, listing_id).await?;
    if listing.owner_user_id == auth.user_id {
        return Err(ApiError::bad_request(
            "You cannot book a viewing of your own listing",
        ));
    }
    if !listing.is_active() {
        return Err(ApiError::bad_request(
            "Viewings can only be booked for active listings",
        ));
    }

    let viewing = req.into_viewing(listing.id, auth.user_id, listing.owner_user_id);
    state.store.insert_viewing(&viewing).await?;

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        viewing_id = %viewing.id,
        scheduled_at = %viewing.scheduled_at,
        "Viewing requested"
    );

    Ok(Created(ViewingResponse {
        viewing,
        message: "Viewing requested".to_string(),
    }))
}

/// GET /api/me/viewings
pub async fn my_viewings(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedQuery(query): ValidatedQuery<ViewingQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let viewings: Vec<Viewing> = state
        .store
        .viewings_for_user(auth.user_id)
        .await?
        .into_iter()
        .filter(|v| query.matches(v))
        .collect();

    let viewings = viewing_views(&state, auth.user_id, viewings).await?;
    Ok(Json(ViewingListResponse { viewings }))
}

/// POST /api/viewings/:id/status
pub async fn change_viewing_status(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(viewing_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ViewingStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut viewing = state
        .store
        .find_viewing(viewing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Viewing not found"))?;

    let party = viewing
        .party(auth.user_id, auth.is_admin())
        .ok_or_else(|| ApiError::forbidden("You are not part of this viewing"))?;

    let previous = viewing.status;
    viewing.transition(party, &req, Utc::now())?;
    state.store.update_viewing(&viewing, previous).await?;

    tracing::info!(
        user_id = %auth.user_id,
        viewing_id = %viewing_id,
        from = previous.as_str(),
        to = viewing.status.as_str(),
        "Viewing status changed"
    );

    Ok(Json(ViewingResponse {
        message: format!("Viewing is now {}", viewing.status.as_str()),
        viewing,
    }))
}
