//! Listing domain types
//!
//! Listings, their create/update DTOs, the search filter shared by both
//! store adapters, and the completeness score shown to listers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::users::UserSummary;
use super::validation::{
    error, validate_http_url, validate_photo_urls, validate_with, ValidateRequest,
};

/// Minimum completeness before a listing can go live
pub const MIN_ACTIVE_COMPLETENESS: i32 = 50;

/// What is being rented. Also used for a seeker's occupancy preference.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum HousingType {
    Room,
    Apartment,
}

impl HousingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Apartment => "apartment",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "room" => Some(Self::Room),
            "apartment" => Some(Self::Apartment),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Filled,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Filled => "filled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "active" => Some(Self::Active),
            "paused" => Some(Self::Paused),
            "filled" => Some(Self::Filled),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        use ListingStatus::*;
        matches!(
            (self, next),
            (Draft, Active)
                | (Active, Paused)
                | (Paused, Active)
                | (Active, Filled)
                | (Paused, Filled)
                | (Filled, Active)
        )
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub owner_user_id: Uuid,
    #[serde(rename = "type")]
    pub listing_type: HousingType,
    pub address: String,
    pub neighborhood: String,
    pub lat: f64,
    pub lng: f64,
    pub rent: i32,
    pub bills_avg: Option<i32>,
    pub deposit: Option<i32>,
    pub size_m2: Option<i32>,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub floor: Option<i32>,
    pub elevator: Option<bool>,
    pub furnished: Option<bool>,
    pub amenities: Vec<String>,
    pub accessibility: Vec<String>,
    pub roommates: Option<serde_json::Value>,
    pub policies: Option<serde_json::Value>,
    pub available_from: DateTime<Utc>,
    pub lease_term_months: Option<i32>,
    pub photos: Vec<String>,
    pub video_url: Option<String>,
    pub description: String,
    pub completeness: i32,
    pub status: ListingStatus,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }

    pub fn summary(&self) -> ListingSummary {
        ListingSummary {
            id: self.id,
            listing_type: self.listing_type,
            address: self.address.clone(),
            neighborhood: self.neighborhood.clone(),
            rent: self.rent,
            photo: self.photos.first().cloned(),
            status: self.status,
        }
    }

    /// Recompute the completeness score after any edit.
    pub fn refresh_completeness(&mut self) {
        self.completeness = completeness(self);
    }

    /// Lowercased text the free-text query searches in.
    fn matches_text(&self, needle: &str) -> bool {
        self.description.to_lowercase().contains(needle)
            || self.address.to_lowercase().contains(needle)
            || self.neighborhood.to_lowercase().contains(needle)
    }
}

/// Compact listing shown inside applications, threads and saved items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub listing_type: HousingType,
    pub address: String,
    pub neighborhood: String,
    pub rent: i32,
    pub photo: Option<String>,
    pub status: ListingStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingWithOwner {
    #[serde(flatten)]
    pub listing: Listing,
    pub owner: Option<UserSummary>,
}

/// Listing completeness, 0..=100. The weights sum to exactly 100.
pub fn completeness(listing: &Listing) -> i32 {
    let mut score = 0;

    // Required fields are validated on create, so they always count
    score += 30;

    score += 3 * listing.photos.len().min(5) as i32;

    if listing.description.trim().chars().count() >= 150 {
        score += 5;
    }

    let optional_numbers = [
        listing.size_m2,
        listing.rooms,
        listing.bathrooms,
        listing.bills_avg,
        listing.deposit,
        listing.lease_term_months,
    ];
    score += 5 * optional_numbers.iter().filter(|v| v.is_some()).count() as i32;

    if !listing.amenities.is_empty() {
        score += 5;
    }
    if !listing.accessibility.is_empty() {
        score += 3;
    }
    if listing
        .policies
        .as_ref()
        .map(|p| !p.is_null() && p.as_object().map_or(true, |o| !o.is_empty()))
        .unwrap_or(false)
    {
        score += 4;
    }
    if listing.floor.is_some() {
        score += 2;
    }
    if listing.elevator.is_some() {
        score += 2;
    }
    if listing.furnished.is_some() {
        score += 2;
    }
    if listing.video_url.is_some() {
        score += 2;
    }

    score.min(100)
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateListingRequest {
    #[serde(rename = "type")]
    pub listing_type: HousingType,
    #[validate(length(min = 5, max = 200, message = "Address must be 5-200 characters"))]
    pub address: String,
    #[validate(length(min = 2, max = 50, message = "Neighborhood must be 2-50 characters"))]
    pub neighborhood: String,
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    pub lng: f64,
    #[validate(range(min = 1, max = 50000, message = "Rent must be between 1 and 50000"))]
    pub rent: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub bills_avg: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub deposit: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub size_m2: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub rooms: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub bathrooms: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub floor: Option<i32>,
    #[serde(default)]
    pub elevator: Option<bool>,
    #[serde(default)]
    pub furnished: Option<bool>,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 amenities"))]
    pub amenities: Vec<String>,
    #[serde(default)]
    pub accessibility: Vec<String>,
    #[serde(default)]
    pub roommates: Option<serde_json::Value>,
    #[serde(default)]
    pub policies: Option<serde_json::Value>,
    pub available_from: DateTime<Utc>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub lease_term_months: Option<i32>,
    #[validate(
        length(min = 1, max = 15, message = "Between 1 and 15 photos are required"),
        custom(function = "validate_photo_urls")
    )]
    pub photos: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_http_url"))]
    pub video_url: Option<String>,
    #[validate(length(min = 30, max = 1200, message = "Description must be 30-1200 characters"))]
    pub description: String,
}

impl ValidateRequest for CreateListingRequest {}

impl CreateListingRequest {
    /// Build a draft owned by `owner`.
    pub fn into_listing(self, owner: Uuid) -> Listing {
        let now = Utc::now();
        let mut listing = Listing {
            id: Uuid::new_v4(),
            owner_user_id: owner,
            listing_type: self.listing_type,
            address: self.address.trim().to_string(),
            neighborhood: self.neighborhood.trim().to_string(),
            lat: self.lat,
            lng: self.lng,
            rent: self.rent,
            bills_avg: self.bills_avg,
            deposit: self.deposit,
            size_m2: self.size_m2,
            rooms: self.rooms,
            bathrooms: self.bathrooms,
            floor: self.floor,
            elevator: self.elevator,
            furnished: self.furnished,
            amenities: self.amenities,
            accessibility: self.accessibility,
            roommates: self.roommates,
            policies: self.policies,
            available_from: self.available_from,
            lease_term_months: self.lease_term_months,
            photos: self.photos,
            video_url: self.video_url,
            description: self.description,
            completeness: 0,
            status: ListingStatus::Draft,
            view_count: 0,
            created_at: now,
            updated_at: now,
        };
        listing.refresh_completeness();
        listing
    }
}

/// `PATCH /api/listings/:id` - every field optional, same rules as create.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateListingRequest {
    #[serde(default, rename = "type")]
    pub listing_type: Option<HousingType>,
    #[serde(default)]
    #[validate(length(min = 5, max = 200, message = "Address must be 5-200 characters"))]
    pub address: Option<String>,
    #[serde(default)]
    #[validate(length(min = 2, max = 50, message = "Neighborhood must be 2-50 characters"))]
    pub neighborhood: Option<String>,
    #[serde(default)]
    #[validate(range(min = -90.0, max = 90.0, message = "Latitude out of range"))]
    pub lat: Option<f64>,
    #[serde(default)]
    #[validate(range(min = -180.0, max = 180.0, message = "Longitude out of range"))]
    pub lng: Option<f64>,
    #[serde(default)]
    #[validate(range(min = 1, max = 50000, message = "Rent must be between 1 and 50000"))]
    pub rent: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub bills_avg: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub deposit: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub size_m2: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub rooms: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub bathrooms: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Must not be negative"))]
    pub floor: Option<i32>,
    #[serde(default)]
    pub elevator: Option<bool>,
    #[serde(default)]
    pub furnished: Option<bool>,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 amenities"))]
    pub amenities: Option<Vec<String>>,
    #[serde(default)]
    pub accessibility: Option<Vec<String>>,
    #[serde(default)]
    pub roommates: Option<serde_json::Value>,
    #[serde(default)]
    pub policies: Option<serde_json::Value>,
    #[serde(default)]
    pub available_from: Option<DateTime<Utc>>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be positive"))]
    pub lease_term_months: Option<i32>,
    #[serde(default)]
    #[validate(
        length(min = 1, max = 15, message = "Between 1 and 15 photos are required"),
        custom(function = "validate_photo_urls")
    )]
    pub photos: Option<Vec<String>>,
    #[serde(default)]
    #[validate(custom(function = "validate_http_url"))]
    pub video_url: Option<String>,
    #[serde(default)]
    #[validate(length(min = 30, max = 1200, message = "Description must be 30-1200 characters"))]
    pub description: Option<String>,
}

impl ValidateRequest for UpdateListingRequest {}

impl UpdateListingRequest {
    pub fn apply(self, listing: &mut Listing) {
        macro_rules! set {
            ($($field:ident),* $(,)?) => {
                $(if let Some(v) = self.$field { listing.$field = v; })*
            };
        }
        macro_rules! set_opt {
            ($($field:ident),* $(,)?) => {
                $(if self.$field.is_some() { listing.$field = self.$field; })*
            };
        }

        set!(listing_type, lat, lng, rent, amenities, accessibility, available_from, photos, description);
        set_opt!(
            bills_avg,
            deposit,
            size_m2,
            rooms,
            bathrooms,
            floor,
            elevator,
            furnished,
            roommates,
            policies,
            lease_term_months,
            video_url,
        );
        if let Some(address) = self.address {
            listing.address = address.trim().to_string();
        }
        if let Some(neighborhood) = self.neighborhood {
            listing.neighborhood = neighborhood.trim().to_string();
        }

        listing.updated_at = Utc::now();
        listing.refresh_completeness();
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingStatusRequest {
    pub status: ListingStatus,
}

impl ValidateRequest for ListingStatusRequest {}

// ============================================================================
// Search
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    DateDesc,
}

impl SortBy {
    /// Total order used by both store adapters; id breaks ties so pages are stable.
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        let primary = match self {
            Self::Relevance => b
                .completeness
                .cmp(&a.completeness)
                .then_with(|| b.created_at.cmp(&a.created_at)),
            Self::PriceAsc => a.rent.cmp(&b.rent),
            Self::PriceDesc => b.rent.cmp(&a.rent),
            Self::DateDesc => b.created_at.cmp(&a.created_at),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

/// `GET /api/listings` query string
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListingSearchQuery {
    #[serde(default)]
    #[validate(length(max = 100, message = "Query must be at most 100 characters"))]
    pub query: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be a positive integer"))]
    pub min_rent: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Must be a positive integer"))]
    pub max_rent: Option<i32>,
    #[serde(default, rename = "type")]
    pub listing_type: Option<HousingType>,
    #[serde(default)]
    #[validate(length(max = 50, message = "Neighborhood must be at most 50 characters"))]
    pub neighborhood: Option<String>,
    #[serde(default)]
    pub furnished: Option<bool>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort_by: Option<SortBy>,
}

impl ValidateRequest for ListingSearchQuery {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        validate_with(self, |errors| {
            if let (Some(min), Some(max)) = (self.min_rent, self.max_rent) {
                if min > max {
                    errors.add(
                        "min_rent",
                        error("rent_range", "minRent must not exceed maxRent"),
                    );
                }
            }
        })
    }
}

impl ListingSearchQuery {
    pub fn filter(&self) -> ListingFilter {
        fn non_blank(s: &Option<String>) -> Option<String> {
            s.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
        }

        ListingFilter {
            listing_type: self.listing_type,
            min_rent: self.min_rent,
            max_rent: self.max_rent,
            neighborhood: non_blank(&self.neighborhood),
            furnished: self.furnished,
            text: non_blank(&self.query),
        }
    }
}

/// Normalized search predicate over active listings. Text fields are lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingFilter {
    pub listing_type: Option<HousingType>,
    pub min_rent: Option<i32>,
    pub max_rent: Option<i32>,
    pub neighborhood: Option<String>,
    pub furnished: Option<bool>,
    pub text: Option<String>,
}

impl ListingFilter {
    pub fn matches(&self, listing: &Listing) -> bool {
        listing.is_active()
            && self.listing_type.map_or(true, |t| listing.listing_type == t)
            && self.min_rent.map_or(true, |min| listing.rent >= min)
            && self.max_rent.map_or(true, |max| listing.rent <= max)
            && self.neighborhood.as_deref().map_or(true, |n| {
                listing.neighborhood.to_lowercase().contains(n)
            })
            && self.furnished.map_or(true, |f| listing.furnished == Some(f))
            && self.text.as_deref().map_or(true, |t| listing.matches_text(t))
    }
}

/// A page of search results plus the count of all matches.
#[derive(Debug, Clone)]
pub struct ListingPage {
    pub items: Vec<Listing>,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub application_count: usize,
}
