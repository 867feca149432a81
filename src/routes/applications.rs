//! Rental applications
//!
//! Seekers apply to active listings; the listing owner accepts or rejects;
//! the applicant may withdraw.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, PageRequest, PaginationMeta, ValidatedJson, ValidatedQuery};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::applications::{
    ApplicationQuery, ApplicationStats, ApplicationView, CreateApplicationRequest,
    DecisionRequest,
};
use crate::domain::{Application, Role};
use crate::error::ApiError;
use crate::routes::listings::fetch_listing;
use crate::routes::{listings_by_id, users_by_id};

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    pub application: Application,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub applications: Vec<ApplicationView>,
    pub stats: ApplicationStats,
    pub pagination: PaginationMeta,
}

async fn fetch_application(state: &AppState, id: Uuid) -> Result<Application, ApiError> {
    state
        .store
        .find_application(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

/// Applications the caller is party to: seekers see their own, listers
/// see those made to their listings.
pub(crate) async fn applications_for(
    state: &AppState,
    user_id: Uuid,
    role: Role,
) -> Result<Vec<Application>, ApiError> {
    let applications = match role {
        Role::Seeker => state.store.applications_by_applicant(user_id).await?,
        Role::Lister | Role::Admin => state.store.applications_for_owner(user_id).await?,
    };
    Ok(applications)
}

/// POST /api/listings/:id/applications
pub async fn create_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<CreateApplicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[Role::Seeker])?;

    let listing = fetch_listing(&state, listing_id).await?;
    if listing.owner_user_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot apply to your own listing"));
    }
    if !listing.is_active() {
        return Err(ApiError::bad_request(
            "This listing is not accepting applications",
        ));
    }

    if state
        .store
        .find_live_application(listing_id, auth.user_id)
        .await?
        .is_some()
    {
        return Err(ApiError::conflict(
            "You have already applied to this listing",
        ));
    }

    let application = Application::new(
        listing_id,
        auth.user_id,
        req.message.trim().to_string(),
        req.preferred_move_in,
    );
    state.store.insert_application(&application).await?;

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        application_id = %application.id,
        "Application submitted"
    );

    Ok(Created(ApplicationResponse {
        application,
        message: "Application submitted".to_string(),
    }))
}

/// GET /api/me/applications
pub async fn my_applications(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedQuery(query): ValidatedQuery<ApplicationQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let all = applications_for(&state, auth.user_id, auth.role()).await?;
    let stats = ApplicationStats::tally(&all);

    let filtered: Vec<Application> = all
        .into_iter()
        .filter(|a| query.status.map_or(true, |s| a.status == s))
        .collect();

    let page = PageRequest::new(query.page, query.limit);
    let total = filtered.len() as u64;
    let items = page.slice(filtered);

    let listing_ids: Vec<Uuid> = items.iter().map(|a| a.listing_id).collect();
    let listings = listings_by_id(&state, &listing_ids).await?;

    let is_applicant = auth.role() == Role::Seeker;
    let counterpart_ids: Vec<Uuid> = items
        .iter()
        .filter_map(|a| {
            if is_applicant {
                listings.get(&a.listing_id).map(|l| l.owner_user_id)
            } else {
                Some(a.applicant_id)
            }
        })
        .collect();
    let users = users_by_id(&state, &counterpart_ids).await?;

    let applications = items
        .into_iter()
        .map(|application| {
            let listing = listings.get(&application.listing_id);
            let counterpart = if is_applicant {
                listing.map(|l| l.owner_user_id)
            } else {
                Some(application.applicant_id)
            };
            ApplicationView {
                listing: listing.map(|l| l.summary()),
                counterpart_name: counterpart
                    .and_then(|id| users.get(&id))
                    .and_then(|u| u.name.clone()),
                application,
            }
        })
        .collect();

    Ok(Json(ApplicationListResponse {
        applications,
        stats,
        pagination: PaginationMeta::new(page, total),
    }))
}

/// POST /api/applications/:id/decision
///
/// Listing owner accepts or rejects a pending application.
pub async fn decide_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<DecisionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut application = fetch_application(&state, application_id).await?;
    let listing = fetch_listing(&state, application.listing_id).await?;
    auth.require_owner_or_admin(listing.owner_user_id)?;

    let previous = application.status;
    application.decide(req.status).map_err(|current| {
        ApiError::conflict(format!(
            "Only pending applications can be decided (currently {})",
            current.as_str()
        ))
    })?;
    state.store.update_application(&application, previous).await?;

    tracing::info!(
        user_id = %auth.user_id,
        application_id = %application_id,
        status = application.status.as_str(),
        "Application decided"
    );

    Ok(Json(ApplicationResponse {
        message: format!("Application {}", application.status.as_str()),
        application,
    }))
}

/// POST /api/applications/:id/withdraw
pub async fn withdraw_application(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(application_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut application = fetch_application(&state, application_id).await?;
    if application.applicant_id != auth.user_id {
        return Err(ApiError::forbidden(
            "Only the applicant can withdraw an application",
        ));
    }

    let previous = application.status;
    application.withdraw().map_err(|current| {
        ApiError::conflict(format!(
            "Cannot withdraw an application that is {}",
            current.as_str()
        ))
    })?;
    state.store.update_application(&application, previous).await?;

    tracing::info!(
        user_id = %auth.user_id,
        application_id = %application_id,
        "Application withdrawn"
    );

    Ok(Json(ApplicationResponse {
        application,
        message: "Application withdrawn".to_string(),
    }))
}
