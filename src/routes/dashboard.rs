use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::applications::ApplicationStats;
use crate::domain::dashboard::{
    Dashboard, ListerDashboard, ListingCounts, SeekerDashboard, UPCOMING_VIEWINGS,
};
use crate::domain::matching::{rank, DEFAULT_MIN_SCORE};
use crate::domain::profiles::completeness;
use crate::domain::viewings::ViewingView;
use crate::domain::Role;
use crate::error::ApiError;
use crate::routes::profiles::load_profile;
use crate::routes::viewings::viewing_views;

/// Next open viewings for `user_id`, soonest first.
async fn upcoming_viewings(state: &AppState, user_id: Uuid) -> Result<Vec<ViewingView>, ApiError> {
    let now = Utc::now();
    let mut upcoming: Vec<_> = state
        .store
        .viewings_for_user(user_id)
        .await?
        .into_iter()
        .filter(|v| v.status.is_open() && v.scheduled_at >= now)
        .collect();
    upcoming.sort_by_key(|v| v.scheduled_at);
    upcoming.truncate(UPCOMING_VIEWINGS);

    viewing_views(state, user_id, upcoming).await
}

async fn unread_messages(state: &AppState, user_id: Uuid) -> Result<usize, ApiError> {
    Ok(state
        .store
        .messages_involving(user_id)
        .await?
        .iter()
        .filter(|m| m.is_unread_by(user_id))
        .count())
}

async fn seeker_dashboard(state: &AppState, user_id: Uuid) -> Result<SeekerDashboard, ApiError> {
    let profile = load_profile(state, user_id).await?;

    let (applications, saved, upcoming_viewings, unread_messages) = tokio::try_join!(
        async { Ok::<_, ApiError>(state.store.applications_by_applicant(user_id).await?) },
        async { Ok::<_, ApiError>(state.store.saved_by_user(user_id).await?) },
        upcoming_viewings(state, user_id),
        unread_messages(state, user_id),
    )?;

    let match_count = match &profile {
        Some(profile) => {
            rank(profile, state.store.active_listings().await?, DEFAULT_MIN_SCORE).len()
        }
        None => 0,
    };

    Ok(SeekerDashboard {
        profile_completeness: profile.as_ref().map_or(0, completeness),
        has_profile: profile.is_some(),
        applications: ApplicationStats::tally(&applications),
        upcoming_viewings,
        saved_count: saved.len(),
        unread_messages,
        match_count,
    })
}

async fn lister_dashboard(state: &AppState, user_id: Uuid) -> Result<ListerDashboard, ApiError> {
    let (listings, applications, upcoming_viewings, unread_messages) = tokio::try_join!(
        async { Ok::<_, ApiError>(state.store.listings_by_owner(user_id).await?) },
        async { Ok::<_, ApiError>(state.store.applications_for_owner(user_id).await?) },
        upcoming_viewings(state, user_id),
        unread_messages(state, user_id),
    )?;

    Ok(ListerDashboard {
        listings: ListingCounts::tally(&listings),
        total_views: listings.iter().map(|l| l.view_count).sum(),
        applications: ApplicationStats::tally(&applications),
        upcoming_viewings,
        unread_messages,
    })
}

/// GET /api/me/dashboard
///
/// Seekers get their search progress; listers and admins their listing activity.
pub async fn my_dashboard(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let dashboard = match auth.role() {
        Role::Seeker => Dashboard::Seeker(seeker_dashboard(&state, auth.user_id).await?),
        Role::Lister | Role::Admin => {
            Dashboard::Lister(lister_dashboard(&state, auth.user_id).await?)
        }
    };

    Ok(Json(dashboard))
}
