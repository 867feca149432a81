//! Saved (favourited) listings

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::listings::Listing;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedListing {
    pub user_id: Uuid,
    pub listing_id: Uuid,
    pub notifications: bool,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveListingRequest {
    #[serde(default)]
    pub notifications: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedListingView {
    pub listing_id: Uuid,
    pub notifications: bool,
    pub saved_at: DateTime<Utc>,
    /// None once the listing has been deleted
    pub listing: Option<Listing>,
}
