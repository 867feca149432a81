//! Listing routes
//!
//! Public search and detail, owner-only writes. Listing details are cached
//! in Redis and invalidated on every write.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, NoContent, PageRequest, PaginationMeta, ValidatedJson, ValidatedQuery};
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::domain::listings::{
    CreateListingRequest, ListingSearchQuery, ListingStatusRequest, ListingWithOwner, MyListing,
    UpdateListingRequest, MIN_ACTIVE_COMPLETENESS,
};
use crate::domain::{Listing, ListingStatus, Role};
use crate::error::ApiError;
use crate::services::cache::keys as cache_keys;

#[derive(Debug, Serialize)]
pub struct ListingSearchResponse {
    pub listings: Vec<Listing>,
    pub pagination: PaginationMeta,
}

#[derive(Debug, Serialize)]
pub struct ListingResponse {
    pub listing: Listing,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListingDetailResponse {
    pub listing: ListingWithOwner,
}

#[derive(Debug, Serialize)]
pub struct MyListingsResponse {
    pub listings: Vec<MyListing>,
}

/// Store lookup that maps a missing listing to 404.
pub(crate) async fn fetch_listing(state: &AppState, listing_id: Uuid) -> Result<Listing, ApiError> {
    state
        .store
        .find_listing(listing_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Listing not found"))
}

/// Cache-first listing lookup for reads.
async fn cached_listing(state: &AppState, listing_id: Uuid) -> Result<Listing, ApiError> {
    let cache_key = cache_keys::listing(listing_id);
    if let Some(listing) = state.cache.get::<Listing>(&cache_key).await {
        tracing::debug!(listing_id = %listing_id, "Listing cache hit");
        return Ok(listing);
    }

    let listing = fetch_listing(state, listing_id).await?;
    state.cache.set(&cache_key, &listing).await;
    Ok(listing)
}

// ============================================================================
// Search & detail
// ============================================================================

/// GET /api/listings
///
/// Search active listings with filters, sort and pagination.
pub async fn search_listings(
    State(state): State<Arc<AppState>>,
    ValidatedQuery(query): ValidatedQuery<ListingSearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = PageRequest::new(query.page, query.limit);
    let sort = query.sort_by.unwrap_or_default();
    let filter = query.filter();

    let result = state
        .store
        .search_listings(&filter, sort, page.limit, page.offset())
        .await?;

    tracing::debug!(
        total = result.total,
        page = page.page,
        limit = page.limit,
        "Listing search"
    );

    Ok(Json(ListingSearchResponse {
        listings: result.items,
        pagination: PaginationMeta::new(page, result.total),
    }))
}

/// GET /api/listings/:id
///
/// Non-active listings are only visible to their owner and admins.
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    Path(listing_id): Path<Uuid>,
    auth: Option<RequireAuth>,
) -> Result<impl IntoResponse, ApiError> {
    let mut listing = cached_listing(&state, listing_id).await?;

    let viewer: Option<&AuthContext> = auth.as_deref();
    let is_owner = viewer.is_some_and(|a| a.user_id == listing.owner_user_id);
    let is_admin = viewer.is_some_and(AuthContext::is_admin);

    if !listing.is_active() && !is_owner && !is_admin {
        return Err(ApiError::not_found("Listing not found"));
    }

    if listing.is_active() && !is_owner {
        state.store.increment_listing_views(listing_id).await?;
        listing.view_count += 1;
    }

    let owner = state
        .store
        .find_user(listing.owner_user_id)
        .await?
        .map(|u| u.summary());

    Ok(Json(ListingDetailResponse {
        listing: ListingWithOwner { listing, owner },
    }))
}

// ============================================================================
// Owner writes
// ============================================================================

/// POST /api/listings
///
/// Listers create listings as drafts.
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedJson(req): ValidatedJson<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    auth.require_role(&[Role::Lister, Role::Admin])?;

    let listing = req.into_listing(auth.user_id);
    state.store.insert_listing(&listing).await?;

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing.id,
        completeness = listing.completeness,
        "Listing created"
    );

    Ok(Created(ListingResponse {
        listing,
        message: "Listing created as draft".to_string(),
    }))
}

/// PATCH /api/listings/:id
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<UpdateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut listing = fetch_listing(&state, listing_id).await?;
    auth.require_owner_or_admin(listing.owner_user_id)?;

    req.apply(&mut listing);
    state.store.update_listing(&listing).await?;
    state.cache.delete(&cache_keys::listing(listing_id)).await;

    tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Listing updated");

    Ok(Json(ListingResponse {
        listing,
        message: "Listing updated".to_string(),
    }))
}

/// POST /api/listings/:id/status
pub async fn change_listing_status(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    ValidatedJson(req): ValidatedJson<ListingStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut listing = fetch_listing(&state, listing_id).await?;
    auth.require_owner_or_admin(listing.owner_user_id)?;

    if !listing.status.can_transition_to(req.status) {
        return Err(ApiError::conflict(format!(
            "Cannot change listing from {} to {}",
            listing.status, req.status
        )));
    }

    if req.status == ListingStatus::Active && listing.completeness < MIN_ACTIVE_COMPLETENESS {
        return Err(ApiError::bad_request(format!(
            "Listing must be at least {}% complete to publish (currently {}%)",
            MIN_ACTIVE_COMPLETENESS, listing.completeness
        )));
    }

    let previous = listing.status;
    listing.status = req.status;
    listing.updated_at = chrono::Utc::now();
    state.store.update_listing(&listing).await?;
    state.cache.delete(&cache_keys::listing(listing_id)).await;

    tracing::info!(
        listing_id = %listing_id,
        from = %previous,
        to = %listing.status,
        "Listing status changed"
    );

    Ok(Json(ListingResponse {
        message: format!("Listing is now {}", listing.status),
        listing,
    }))
}

/// DELETE /api/listings/:id
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = fetch_listing(&state, listing_id).await?;
    auth.require_owner_or_admin(listing.owner_user_id)?;

    state.store.delete_listing(listing_id).await?;
    state.cache.delete(&cache_keys::listing(listing_id)).await;

    tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Listing deleted");

    Ok(NoContent)
}

/// GET /api/me/listings
///
/// The caller's listings, newest first, with application counts.
pub async fn my_listings(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let (listings, applications) = tokio::try_join!(
        state.store.listings_by_owner(auth.user_id),
        state.store.applications_for_owner(auth.user_id),
    )?;

    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for application in &applications {
        *counts.entry(application.listing_id).or_default() += 1;
    }

    let listings = listings
        .into_iter()
        .map(|listing| MyListing {
            application_count: counts.get(&listing.id).copied().unwrap_or(0),
            listing,
        })
        .collect();

    Ok(Json(MyListingsResponse { listings }))
}
