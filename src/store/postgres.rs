//! PostgreSQL store backed by sqlx

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::db;
use crate::domain::applications::ApplicationStatus;
use crate::domain::auth::OtpChallenge;
use crate::domain::listings::{HousingType, ListingFilter, ListingPage, ListingStatus, SortBy};
use crate::domain::profiles::Lifestyle;
use crate::domain::users::{Role, VerifiedFlags};
use crate::domain::viewings::{ViewingKind, ViewingStatus};
use crate::domain::{Application, Listing, Message, Profile, SavedListing, User, Viewing};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Error for a status-guarded UPDATE that matched no row: `Conflict`
    /// when the row exists with another status, `NotFound` otherwise.
    async fn stale_or_missing(&self, table: &str, id: Uuid, entity: &'static str) -> StoreError {
        let exists = sqlx::query_scalar::<_, bool>(&format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
            table
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await;

        match exists {
            Ok(true) => StoreError::Conflict(format!("{} was changed by another request", entity)),
            Ok(false) => StoreError::NotFound(entity),
            Err(e) => e.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let message = match db_err.constraint() {
                    Some("users_phone_key") => "Phone number already registered",
                    Some("users_email_key") => "Email already in use",
                    Some("applications_live_key") => "You have already applied to this listing",
                    _ => "Record already exists",
                };
                return StoreError::Conflict(message.to_string());
            }
        }
        StoreError::Backend(anyhow::Error::new(err).context("database error"))
    }
}

fn corrupt(column: &str, value: &str) -> StoreError {
    StoreError::Backend(anyhow!("unexpected {} value in database: {}", column, value))
}

/// `%needle%` for ILIKE with the pattern metacharacters escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

// ============================================================================
// Row types
// ============================================================================

const USER_COLUMNS: &str = "id, phone, email, name, role, lang, verified_flags, \
     profile_completeness, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    phone: String,
    email: Option<String>,
    name: Option<String>,
    role: String,
    lang: String,
    verified_flags: Json<VerifiedFlags>,
    profile_completeness: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            role: Role::parse(&r.role).ok_or_else(|| corrupt("role", &r.role))?,
            id: r.id,
            phone: r.phone,
            email: r.email,
            name: r.name,
            lang: r.lang,
            verified_flags: r.verified_flags.0,
            profile_completeness: r.profile_completeness,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    user_id: Uuid,
    budget_min: Option<i32>,
    budget_max: Option<i32>,
    move_in_earliest: Option<DateTime<Utc>>,
    move_in_latest: Option<DateTime<Utc>>,
    areas: Vec<String>,
    occupancy_type: Option<String>,
    lifestyle: Json<Lifestyle>,
    bio: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = StoreError;

    fn try_from(r: ProfileRow) -> Result<Self, Self::Error> {
        let occupancy_type = match r.occupancy_type {
            Some(t) => Some(HousingType::parse(&t).ok_or_else(|| corrupt("occupancy_type", &t))?),
            None => None,
        };
        Ok(Profile {
            user_id: r.user_id,
            budget_min: r.budget_min,
            budget_max: r.budget_max,
            move_in_earliest: r.move_in_earliest,
            move_in_latest: r.move_in_latest,
            areas: r.areas,
            occupancy_type,
            lifestyle: r.lifestyle.0,
            bio: r.bio,
            updated_at: r.updated_at,
        })
    }
}

const LISTING_COLUMNS: &str = "id, owner_user_id, type, address, neighborhood, lat, lng, rent, \
     bills_avg, deposit, size_m2, rooms, bathrooms, floor, elevator, furnished, amenities, \
     accessibility, roommates, policies, available_from, lease_term_months, photos, video_url, \
     description, completeness, status, view_count, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ListingRow {
    id: Uuid,
    owner_user_id: Uuid,
    #[sqlx(rename = "type")]
    listing_type: String,
    address: String,
    neighborhood: String,
    lat: f64,
    lng: f64,
    rent: i32,
    bills_avg: Option<i32>,
    deposit: Option<i32>,
    size_m2: Option<i32>,
    rooms: Option<i32>,
    bathrooms: Option<i32>,
    floor: Option<i32>,
    elevator: Option<bool>,
    furnished: Option<bool>,
    amenities: Vec<String>,
    accessibility: Vec<String>,
    roommates: Option<serde_json::Value>,
    policies: Option<serde_json::Value>,
    available_from: DateTime<Utc>,
    lease_term_months: Option<i32>,
    photos: Vec<String>,
    video_url: Option<String>,
    description: String,
    completeness: i32,
    status: String,
    view_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = StoreError;

    fn try_from(r: ListingRow) -> Result<Self, Self::Error> {
        Ok(Listing {
            listing_type: HousingType::parse(&r.listing_type)
                .ok_or_else(|| corrupt("type", &r.listing_type))?,
            status: ListingStatus::parse(&r.status).ok_or_else(|| corrupt("status", &r.status))?,
            id: r.id,
            owner_user_id: r.owner_user_id,
            address: r.address,
            neighborhood: r.neighborhood,
            lat: r.lat,
            lng: r.lng,
            rent: r.rent,
            bills_avg: r.bills_avg,
            deposit: r.deposit,
            size_m2: r.size_m2,
            rooms: r.rooms,
            bathrooms: r.bathrooms,
            floor: r.floor,
            elevator: r.elevator,
            furnished: r.furnished,
            amenities: r.amenities,
            accessibility: r.accessibility,
            roommates: r.roommates,
            policies: r.policies,
            available_from: r.available_from,
            lease_term_months: r.lease_term_months,
            photos: r.photos,
            video_url: r.video_url,
            description: r.description,
            completeness: r.completeness,
            view_count: r.view_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const APPLICATION_COLUMNS: &str =
    "id, listing_id, applicant_id, message, preferred_move_in, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    id: Uuid,
    listing_id: Uuid,
    applicant_id: Uuid,
    message: String,
    preferred_move_in: Option<DateTime<Utc>>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ApplicationRow> for Application {
    type Error = StoreError;

    fn try_from(r: ApplicationRow) -> Result<Self, Self::Error> {
        Ok(Application {
            status: ApplicationStatus::parse(&r.status)
                .ok_or_else(|| corrupt("status", &r.status))?,
            id: r.id,
            listing_id: r.listing_id,
            applicant_id: r.applicant_id,
            message: r.message,
            preferred_move_in: r.preferred_move_in,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    listing_id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    body: String,
    created_at: DateTime<Utc>,
    read_at: Option<DateTime<Utc>>,
}

impl From<MessageRow> for Message {
    fn from(r: MessageRow) -> Self {
        Message {
            id: r.id,
            listing_id: r.listing_id,
            sender_id: r.sender_id,
            recipient_id: r.recipient_id,
            body: r.body,
            created_at: r.created_at,
            read_at: r.read_at,
        }
    }
}

const VIEWING_COLUMNS: &str = "id, listing_id, seeker_id, lister_id, scheduled_at, \
     duration_minutes, kind, meeting_url, status, note, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ViewingRow {
    id: Uuid,
    listing_id: Uuid,
    seeker_id: Uuid,
    lister_id: Uuid,
    scheduled_at: DateTime<Utc>,
    duration_minutes: i32,
    kind: String,
    meeting_url: Option<String>,
    status: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ViewingRow> for Viewing {
    type Error = StoreError;

    fn try_from(r: ViewingRow) -> Result<Self, Self::Error> {
        Ok(Viewing {
            kind: ViewingKind::parse(&r.kind).ok_or_else(|| corrupt("kind", &r.kind))?,
            status: ViewingStatus::parse(&r.status).ok_or_else(|| corrupt("status", &r.status))?,
            id: r.id,
            listing_id: r.listing_id,
            seeker_id: r.seeker_id,
            lister_id: r.lister_id,
            scheduled_at: r.scheduled_at,
            duration_minutes: r.duration_minutes,
            meeting_url: r.meeting_url,
            note: r.note,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SavedRow {
    user_id: Uuid,
    listing_id: Uuid,
    notifications: bool,
    saved_at: DateTime<Utc>,
}

impl From<SavedRow> for SavedListing {
    fn from(r: SavedRow) -> Self {
        SavedListing {
            user_id: r.user_id,
            listing_id: r.listing_id,
            notifications: r.notifications,
            saved_at: r.saved_at,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

// ============================================================================
// Store implementation
// ============================================================================

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> bool {
        db::health_check(&self.pool).await
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE phone = $1",
            USER_COLUMNS
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(User::try_from).transpose()
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, phone, email, name, role, lang, verified_flags,
                               profile_completeness, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(user.id)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.lang)
        .bind(Json(&user.verified_flags))
        .bind(user.profile_completeness)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, name = $3, role = $4, lang = $5, verified_flags = $6,
                profile_completeness = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(&user.lang)
        .bind(Json(&user.verified_flags))
        .bind(user.profile_completeness)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("User"));
        }
        Ok(())
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT user_id, budget_min, budget_max, move_in_earliest, move_in_latest,
                   areas, occupancy_type, lifestyle, bio, updated_at
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Profile::try_from).transpose()
    }

    async fn upsert_profile(&self, profile: &Profile, completeness: i32) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, budget_min, budget_max, move_in_earliest,
                                  move_in_latest, areas, occupancy_type, lifestyle, bio, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                budget_min = EXCLUDED.budget_min,
                budget_max = EXCLUDED.budget_max,
                move_in_earliest = EXCLUDED.move_in_earliest,
                move_in_latest = EXCLUDED.move_in_latest,
                areas = EXCLUDED.areas,
                occupancy_type = EXCLUDED.occupancy_type,
                lifestyle = EXCLUDED.lifestyle,
                bio = EXCLUDED.bio,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(profile.budget_min)
        .bind(profile.budget_max)
        .bind(profile.move_in_earliest)
        .bind(profile.move_in_latest)
        .bind(&profile.areas)
        .bind(profile.occupancy_type.map(|t| t.as_str()))
        .bind(Json(&profile.lifestyle))
        .bind(&profile.bio)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE users SET profile_completeness = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(profile.user_id)
        .bind(completeness)
        .bind(profile.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("User"));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn insert_listing(&self, l: &Listing) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO listings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, \
             $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, \
             $28, $29, $30)",
            LISTING_COLUMNS
        ))
        .bind(l.id)
        .bind(l.owner_user_id)
        .bind(l.listing_type.as_str())
        .bind(&l.address)
        .bind(&l.neighborhood)
        .bind(l.lat)
        .bind(l.lng)
        .bind(l.rent)
        .bind(l.bills_avg)
        .bind(l.deposit)
        .bind(l.size_m2)
        .bind(l.rooms)
        .bind(l.bathrooms)
        .bind(l.floor)
        .bind(l.elevator)
        .bind(l.furnished)
        .bind(&l.amenities)
        .bind(&l.accessibility)
        .bind(&l.roommates)
        .bind(&l.policies)
        .bind(l.available_from)
        .bind(l.lease_term_months)
        .bind(&l.photos)
        .bind(&l.video_url)
        .bind(&l.description)
        .bind(l.completeness)
        .bind(l.status.as_str())
        .bind(l.view_count)
        .bind(l.created_at)
        .bind(l.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_listing(&self, l: &Listing) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE listings SET
                type = $2, address = $3, neighborhood = $4, lat = $5, lng = $6, rent = $7,
                bills_avg = $8, deposit = $9, size_m2 = $10, rooms = $11, bathrooms = $12,
                floor = $13, elevator = $14, furnished = $15, amenities = $16,
                accessibility = $17, roommates = $18, policies = $19, available_from = $20,
                lease_term_months = $21, photos = $22, video_url = $23, description = $24,
                completeness = $25, status = $26, updated_at = $27
            WHERE id = $1
            "#,
        )
        .bind(l.id)
        .bind(l.listing_type.as_str())
        .bind(&l.address)
        .bind(&l.neighborhood)
        .bind(l.lat)
        .bind(l.lng)
        .bind(l.rent)
        .bind(l.bills_avg)
        .bind(l.deposit)
        .bind(l.size_m2)
        .bind(l.rooms)
        .bind(l.bathrooms)
        .bind(l.floor)
        .bind(l.elevator)
        .bind(l.furnished)
        .bind(&l.amenities)
        .bind(&l.accessibility)
        .bind(&l.roommates)
        .bind(&l.policies)
        .bind(l.available_from)
        .bind(l.lease_term_months)
        .bind(&l.photos)
        .bind(&l.video_url)
        .bind(&l.description)
        .bind(l.completeness)
        .bind(l.status.as_str())
        .bind(l.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Listing"));
        }
        Ok(())
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("Listing"));
        }
        Ok(())
    }

    async fn find_listing(&self, id: Uuid) -> StoreResult<Option<Listing>> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE id = $1",
            LISTING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Listing::try_from).transpose()
    }

    async fn find_listings(&self, ids: &[Uuid]) -> StoreResult<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE id = ANY($1)",
            LISTING_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn search_listings(
        &self,
        filter: &ListingFilter,
        sort: SortBy,
        limit: u32,
        offset: u64,
    ) -> StoreResult<ListingPage> {
        const WHERE: &str = r#"
            status = 'active'
            AND ($1::text IS NULL OR type = $1)
            AND ($2::int IS NULL OR rent >= $2)
            AND ($3::int IS NULL OR rent <= $3)
            AND ($4::text IS NULL OR neighborhood ILIKE $4)
            AND ($5::bool IS NULL OR furnished = $5)
            AND ($6::text IS NULL OR description ILIKE $6 OR address ILIKE $6
                 OR neighborhood ILIKE $6)
        "#;

        let order_by = match sort {
            SortBy::Relevance => "completeness DESC, created_at DESC, id ASC",
            SortBy::PriceAsc => "rent ASC, id ASC",
            SortBy::PriceDesc => "rent DESC, id ASC",
            SortBy::DateDesc => "created_at DESC, id ASC",
        };

        let listing_type = filter.listing_type.map(|t| t.as_str());
        let neighborhood = filter.neighborhood.as_deref().map(like_pattern);
        let text = filter.text.as_deref().map(like_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM listings WHERE {}", WHERE))
            .bind(listing_type)
            .bind(filter.min_rent)
            .bind(filter.max_rent)
            .bind(&neighborhood)
            .bind(filter.furnished)
            .bind(&text)
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE {} ORDER BY {} LIMIT $7 OFFSET $8",
            LISTING_COLUMNS, WHERE, order_by
        ))
        .bind(listing_type)
        .bind(filter.min_rent)
        .bind(filter.max_rent)
        .bind(&neighborhood)
        .bind(filter.furnished)
        .bind(&text)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(ListingPage {
            items: convert_all(rows)?,
            total: total.max(0) as u64,
        })
    }

    async fn listings_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE owner_user_id = $1 ORDER BY created_at DESC, id DESC",
            LISTING_COLUMNS
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn active_listings(&self) -> StoreResult<Vec<Listing>> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE status = 'active'",
            LISTING_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn increment_listing_views(&self, id: Uuid) -> StoreResult<()> {
        sqlx::query("UPDATE listings SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_application(&self, a: &Application) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO applications ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            APPLICATION_COLUMNS
        ))
        .bind(a.id)
        .bind(a.listing_id)
        .bind(a.applicant_id)
        .bind(&a.message)
        .bind(a.preferred_move_in)
        .bind(a.status.as_str())
        .bind(a.created_at)
        .bind(a.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_application(
        &self,
        a: &Application,
        expected: ApplicationStatus,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE applications SET status = $2, updated_at = $3 WHERE id = $1 AND status = $4",
        )
        .bind(a.id)
        .bind(a.status.as_str())
        .bind(a.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.stale_or_missing("applications", a.id, "Application").await);
        }
        Ok(())
    }

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications WHERE id = $1",
            APPLICATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn find_live_application(
        &self,
        listing_id: Uuid,
        applicant_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications \
             WHERE listing_id = $1 AND applicant_id = $2 AND status <> 'withdrawn'",
            APPLICATION_COLUMNS
        ))
        .bind(listing_id)
        .bind(applicant_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Application::try_from).transpose()
    }

    async fn applications_by_applicant(&self, applicant: Uuid) -> StoreResult<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {} FROM applications WHERE applicant_id = $1 \
             ORDER BY created_at DESC, id DESC",
            APPLICATION_COLUMNS
        ))
        .bind(applicant)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn applications_for_owner(&self, owner: Uuid) -> StoreResult<Vec<Application>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            r#"
            SELECT a.id, a.listing_id, a.applicant_id, a.message, a.preferred_move_in,
                   a.status, a.created_at, a.updated_at
            FROM applications a
            JOIN listings l ON l.id = a.listing_id
            WHERE l.owner_user_id = $1
            ORDER BY a.created_at DESC, a.id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn insert_message(&self, m: &Message) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, listing_id, sender_id, recipient_id, body, created_at, read_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(m.id)
        .bind(m.listing_id)
        .bind(m.sender_id)
        .bind(m.recipient_id)
        .bind(&m.body)
        .bind(m.created_at)
        .bind(m.read_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages_involving(&self, user: Uuid) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, listing_id, sender_id, recipient_id, body, created_at, read_at
            FROM messages
            WHERE sender_id = $1 OR recipient_id = $1
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn thread_messages(
        &self,
        listing_id: Uuid,
        a: Uuid,
        b: Uuid,
    ) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, listing_id, sender_id, recipient_id, body, created_at, read_at
            FROM messages
            WHERE listing_id = $1
              AND ((sender_id = $2 AND recipient_id = $3)
                OR (sender_id = $3 AND recipient_id = $2))
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(listing_id)
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn mark_thread_read(
        &self,
        listing_id: Uuid,
        reader: Uuid,
        other: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE messages SET read_at = $4
            WHERE listing_id = $1 AND recipient_id = $2 AND sender_id = $3 AND read_at IS NULL
            "#,
        )
        .bind(listing_id)
        .bind(reader)
        .bind(other)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_viewing(&self, v: &Viewing) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO viewings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            VIEWING_COLUMNS
        ))
        .bind(v.id)
        .bind(v.listing_id)
        .bind(v.seeker_id)
        .bind(v.lister_id)
        .bind(v.scheduled_at)
        .bind(v.duration_minutes)
        .bind(v.kind.as_str())
        .bind(&v.meeting_url)
        .bind(v.status.as_str())
        .bind(&v.note)
        .bind(v.created_at)
        .bind(v.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_viewing(&self, v: &Viewing, expected: ViewingStatus) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE viewings SET scheduled_at = $2, status = $3, updated_at = $4 \
             WHERE id = $1 AND status = $5",
        )
        .bind(v.id)
        .bind(v.scheduled_at)
        .bind(v.status.as_str())
        .bind(v.updated_at)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(self.stale_or_missing("viewings", v.id, "Viewing").await);
        }
        Ok(())
    }

    async fn find_viewing(&self, id: Uuid) -> StoreResult<Option<Viewing>> {
        let row = sqlx::query_as::<_, ViewingRow>(&format!(
            "SELECT {} FROM viewings WHERE id = $1",
            VIEWING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Viewing::try_from).transpose()
    }

    async fn viewings_for_user(&self, user: Uuid) -> StoreResult<Vec<Viewing>> {
        let rows = sqlx::query_as::<_, ViewingRow>(&format!(
            "SELECT {} FROM viewings WHERE seeker_id = $1 OR lister_id = $1 \
             ORDER BY scheduled_at ASC, id ASC",
            VIEWING_COLUMNS
        ))
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn find_saved(
        &self,
        user: Uuid,
        listing_id: Uuid,
    ) -> StoreResult<Option<SavedListing>> {
        let row = sqlx::query_as::<_, SavedRow>(
            r#"
            SELECT user_id, listing_id, notifications, saved_at
            FROM saved_listings
            WHERE user_id = $1 AND listing_id = $2
            "#,
        )
        .bind(user)
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(SavedListing::from))
    }

    async fn upsert_saved(&self, saved: &SavedListing) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO saved_listings (user_id, listing_id, notifications, saved_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, listing_id) DO UPDATE SET notifications = EXCLUDED.notifications
            "#,
        )
        .bind(saved.user_id)
        .bind(saved.listing_id)
        .bind(saved.notifications)
        .bind(saved.saved_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_saved(&self, user: Uuid, listing_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM saved_listings WHERE user_id = $1 AND listing_id = $2")
                .bind(user)
                .bind(listing_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn saved_by_user(&self, user: Uuid) -> StoreResult<Vec<SavedListing>> {
        let rows = sqlx::query_as::<_, SavedRow>(
            r#"
            SELECT user_id, listing_id, notifications, saved_at
            FROM saved_listings
            WHERE user_id = $1
            ORDER BY saved_at DESC, listing_id DESC
            "#,
        )
        .bind(user)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SavedListing::from).collect())
    }

    async fn put_otp_challenge(&self, c: &OtpChallenge) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_challenges (phone, code_hash, expires_at, attempts)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (phone) DO UPDATE SET
                code_hash = EXCLUDED.code_hash,
                expires_at = EXCLUDED.expires_at,
                attempts = EXCLUDED.attempts
            "#,
        )
        .bind(&c.phone)
        .bind(&c.code_hash)
        .bind(c.expires_at)
        .bind(c.attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_otp_challenge(&self, phone: &str) -> StoreResult<Option<OtpChallenge>> {
        let row: Option<(String, String, DateTime<Utc>, i32)> = sqlx::query_as(
            "SELECT phone, code_hash, expires_at, attempts FROM otp_challenges WHERE phone = $1",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(phone, code_hash, expires_at, attempts)| OtpChallenge {
            phone,
            code_hash,
            expires_at,
            attempts,
        }))
    }

    async fn consume_otp_challenge(
        &self,
        phone: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let consumed: Option<i32> = sqlx::query_scalar(
            "DELETE FROM otp_challenges \
             WHERE phone = $1 AND code_hash = $2 AND expires_at > $3 \
             RETURNING 1",
        )
        .bind(phone)
        .bind(code_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(consumed.is_some())
    }

    async fn record_otp_failure(
        &self,
        phone: &str,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i32>> {
        // The row lock taken by UPDATE serializes concurrent guesses
        let attempts: Option<i32> = sqlx::query_scalar(
            "UPDATE otp_challenges SET attempts = attempts + 1 \
             WHERE phone = $1 AND expires_at > $2 \
             RETURNING attempts",
        )
        .bind(phone)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let exhausted = attempts.map_or(true, |n| n >= max_attempts);
        if exhausted {
            sqlx::query(
                "DELETE FROM otp_challenges \
                 WHERE phone = $1 AND (attempts >= $2 OR expires_at <= $3)",
            )
            .bind(phone)
            .bind(max_attempts)
            .bind(now)
            .execute(&self.pool)
            .await?;
        }
        Ok(attempts)
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        let result = sqlx::query(
            "INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn is_token_revoked(&self, jti: Uuid) -> StoreResult<bool> {
        let revoked: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE jti = $1)")
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;
        Ok(revoked)
    }
}
