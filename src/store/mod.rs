//! Persistence layer
//!
//! Handlers talk to a `Store` trait object. `PgStore` is the production
//! adapter; `MemoryStore` backs local development without a database and
//! the integration tests.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::auth::OtpChallenge;
use crate::domain::listings::{ListingFilter, ListingPage, SortBy};
use crate::domain::{
    Application, ApplicationStatus, Listing, Message, Profile, SavedListing, User, Viewing,
    ViewingStatus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// True when the backing database answers.
    async fn health_check(&self) -> bool;

    // ─── Users ───────────────────────────────────────────────────

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>>;
    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>>;
    /// Fails with `Conflict` when the phone or email is taken.
    async fn insert_user(&self, user: &User) -> StoreResult<()>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    // ─── Profiles ────────────────────────────────────────────────

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>>;
    /// Writes the profile and copies `completeness` onto the user row.
    async fn upsert_profile(&self, profile: &Profile, completeness: i32) -> StoreResult<()>;

    // ─── Listings ────────────────────────────────────────────────

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()>;
    async fn update_listing(&self, listing: &Listing) -> StoreResult<()>;
    async fn delete_listing(&self, id: Uuid) -> StoreResult<()>;
    async fn find_listing(&self, id: Uuid) -> StoreResult<Option<Listing>>;
    async fn find_listings(&self, ids: &[Uuid]) -> StoreResult<Vec<Listing>>;
    async fn search_listings(
        &self,
        filter: &ListingFilter,
        sort: SortBy,
        limit: u32,
        offset: u64,
    ) -> StoreResult<ListingPage>;
    /// Newest first.
    async fn listings_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Listing>>;
    async fn active_listings(&self) -> StoreResult<Vec<Listing>>;
    async fn increment_listing_views(&self, id: Uuid) -> StoreResult<()>;

    // ─── Applications ────────────────────────────────────────────

    /// Fails with `Conflict` when a live application already exists.
    async fn insert_application(&self, application: &Application) -> StoreResult<()>;
    /// Writes the new status only if the stored one is still `expected`,
    /// failing with `Conflict` otherwise.
    async fn update_application(
        &self,
        application: &Application,
        expected: ApplicationStatus,
    ) -> StoreResult<()>;
    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>>;
    async fn find_live_application(
        &self,
        listing_id: Uuid,
        applicant_id: Uuid,
    ) -> StoreResult<Option<Application>>;
    /// Newest first.
    async fn applications_by_applicant(&self, applicant: Uuid) -> StoreResult<Vec<Application>>;
    /// Applications to any listing owned by `owner`, newest first.
    async fn applications_for_owner(&self, owner: Uuid) -> StoreResult<Vec<Application>>;

    // ─── Messages ────────────────────────────────────────────────

    async fn insert_message(&self, message: &Message) -> StoreResult<()>;
    async fn messages_involving(&self, user: Uuid) -> StoreResult<Vec<Message>>;
    /// Oldest first.
    async fn thread_messages(
        &self,
        listing_id: Uuid,
        a: Uuid,
        b: Uuid,
    ) -> StoreResult<Vec<Message>>;
    /// Marks messages on the thread addressed to `reader` as read.
    async fn mark_thread_read(
        &self,
        listing_id: Uuid,
        reader: Uuid,
        other: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;

    // ─── Viewings ────────────────────────────────────────────────

    async fn insert_viewing(&self, viewing: &Viewing) -> StoreResult<()>;
    /// Same compare-and-set contract as `update_application`.
    async fn update_viewing(&self, viewing: &Viewing, expected: ViewingStatus) -> StoreResult<()>;
    async fn find_viewing(&self, id: Uuid) -> StoreResult<Option<Viewing>>;
    /// Viewings where `user` is seeker or lister, by scheduled time.
    async fn viewings_for_user(&self, user: Uuid) -> StoreResult<Vec<Viewing>>;

    // ─── Saved listings ──────────────────────────────────────────

    async fn find_saved(&self, user: Uuid, listing_id: Uuid)
        -> StoreResult<Option<SavedListing>>;
    async fn upsert_saved(&self, saved: &SavedListing) -> StoreResult<()>;
    /// Returns false when nothing was saved.
    async fn delete_saved(&self, user: Uuid, listing_id: Uuid) -> StoreResult<bool>;
    /// Newest first.
    async fn saved_by_user(&self, user: Uuid) -> StoreResult<Vec<SavedListing>>;

    // ─── OTP challenges and revoked tokens ───────────────────────

    /// Replaces any outstanding challenge for the same phone.
    async fn put_otp_challenge(&self, challenge: &OtpChallenge) -> StoreResult<()>;
    async fn find_otp_challenge(&self, phone: &str) -> StoreResult<Option<OtpChallenge>>;
    /// Deletes the challenge if `code_hash` matches and it has not expired.
    /// True when this call consumed it.
    async fn consume_otp_challenge(
        &self,
        phone: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;
    /// Counts one wrong guess against a live challenge and returns the new
    /// attempt count. The challenge is dropped once `max_attempts` is
    /// reached, and expired challenges are dropped without counting.
    async fn record_otp_failure(
        &self,
        phone: &str,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i32>>;

    /// True when `jti` was not revoked before this call.
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<bool>;
    async fn is_token_revoked(&self, jti: Uuid) -> StoreResult<bool>;
}
