//! In-process store
//!
//! Same uniqueness rules as the Postgres schema. Locks are never held
//! across an `.await`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::domain::auth::OtpChallenge;
use crate::domain::listings::{ListingFilter, ListingPage, SortBy};
use crate::domain::{
    Application, ApplicationStatus, Listing, Message, Profile, SavedListing, User, Viewing,
    ViewingStatus,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, Profile>,
    listings: HashMap<Uuid, Listing>,
    applications: HashMap<Uuid, Application>,
    messages: Vec<Message>,
    viewings: HashMap<Uuid, Viewing>,
    saved: HashMap<(Uuid, Uuid), SavedListing>,
    otp_challenges: HashMap<String, OtpChallenge>,
    revoked_tokens: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn check_user_unique(&self, user: &User) -> StoreResult<()> {
        for other in self.users.values().filter(|u| u.id != user.id) {
            if other.phone == user.phone {
                return Err(StoreError::Conflict("Phone number already registered".into()));
            }
            if user.email.is_some() && other.email == user.email {
                return Err(StoreError::Conflict("Email already in use".into()));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (DateTime<Utc>, Uuid),
{
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> bool {
        true
    }

    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_user_by_phone(&self, phone: &str) -> StoreResult<Option<User>> {
        Ok(self
            .tables
            .read()
            .users
            .values()
            .find(|u| u.phone == phone)
            .cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> StoreResult<Vec<User>> {
        let tables = self.tables.read();
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn insert_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write();
        tables.check_user_unique(user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&user.id) {
            return Err(StoreError::NotFound("User"));
        }
        tables.check_user_unique(user)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_profile(&self, user_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().profiles.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile, completeness: i32) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let user = tables
            .users
            .get_mut(&profile.user_id)
            .ok_or(StoreError::NotFound("User"))?;
        user.profile_completeness = completeness;
        user.updated_at = profile.updated_at;
        tables.profiles.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn insert_listing(&self, listing: &Listing) -> StoreResult<()> {
        self.tables.write().listings.insert(listing.id, listing.clone());
        Ok(())
    }

    async fn update_listing(&self, listing: &Listing) -> StoreResult<()> {
        let mut tables = self.tables.write();
        match tables.listings.get_mut(&listing.id) {
            Some(existing) => {
                // Views are only ever bumped by increment_listing_views
                let view_count = existing.view_count;
                *existing = listing.clone();
                existing.view_count = view_count;
                Ok(())
            }
            None => Err(StoreError::NotFound("Listing")),
        }
    }

    async fn delete_listing(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write();
        if tables.listings.remove(&id).is_none() {
            return Err(StoreError::NotFound("Listing"));
        }
        // Mirror ON DELETE CASCADE
        tables.applications.retain(|_, a| a.listing_id != id);
        tables.messages.retain(|m| m.listing_id != id);
        tables.viewings.retain(|_, v| v.listing_id != id);
        tables.saved.retain(|(_, listing_id), _| *listing_id != id);
        Ok(())
    }

    async fn find_listing(&self, id: Uuid) -> StoreResult<Option<Listing>> {
        Ok(self.tables.read().listings.get(&id).cloned())
    }

    async fn find_listings(&self, ids: &[Uuid]) -> StoreResult<Vec<Listing>> {
        let tables = self.tables.read();
        Ok(ids
            .iter()
            .filter_map(|id| tables.listings.get(id).cloned())
            .collect())
    }

    async fn search_listings(
        &self,
        filter: &ListingFilter,
        sort: SortBy,
        limit: u32,
        offset: u64,
    ) -> StoreResult<ListingPage> {
        let mut matches: Vec<Listing> = self
            .tables
            .read()
            .listings
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();
        matches.sort_by(|a, b| sort.compare(a, b));

        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();
        Ok(ListingPage { items, total })
    }

    async fn listings_by_owner(&self, owner: Uuid) -> StoreResult<Vec<Listing>> {
        let mut listings: Vec<Listing> = self
            .tables
            .read()
            .listings
            .values()
            .filter(|l| l.owner_user_id == owner)
            .cloned()
            .collect();
        newest_first(&mut listings, |l| (l.created_at, l.id));
        Ok(listings)
    }

    async fn active_listings(&self) -> StoreResult<Vec<Listing>> {
        Ok(self
            .tables
            .read()
            .listings
            .values()
            .filter(|l| l.is_active())
            .cloned()
            .collect())
    }

    async fn increment_listing_views(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let listing = tables
            .listings
            .get_mut(&id)
            .ok_or(StoreError::NotFound("Listing"))?;
        listing.view_count += 1;
        Ok(())
    }

    async fn insert_application(&self, application: &Application) -> StoreResult<()> {
        let mut tables = self.tables.write();
        let duplicate = tables.applications.values().any(|a| {
            a.listing_id == application.listing_id
                && a.applicant_id == application.applicant_id
                && a.status.is_live()
        });
        if duplicate {
            return Err(StoreError::Conflict(
                "You have already applied to this listing".into(),
            ));
        }
        tables
            .applications
            .insert(application.id, application.clone());
        Ok(())
    }

    async fn update_application(
        &self,
        application: &Application,
        expected: ApplicationStatus,
    ) -> StoreResult<()> {
        let mut tables = self.tables.write();
        match tables.applications.get_mut(&application.id) {
            Some(existing) if existing.status == expected => {
                *existing = application.clone();
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(
                "Application was changed by another request".into(),
            )),
            None => Err(StoreError::NotFound("Application")),
        }
    }

    async fn find_application(&self, id: Uuid) -> StoreResult<Option<Application>> {
        Ok(self.tables.read().applications.get(&id).cloned())
    }

    async fn find_live_application(
        &self,
        listing_id: Uuid,
        applicant_id: Uuid,
    ) -> StoreResult<Option<Application>> {
        Ok(self
            .tables
            .read()
            .applications
            .values()
            .find(|a| {
                a.listing_id == listing_id && a.applicant_id == applicant_id && a.status.is_live()
            })
            .cloned())
    }

    async fn applications_by_applicant(&self, applicant: Uuid) -> StoreResult<Vec<Application>> {
        let mut apps: Vec<Application> = self
            .tables
            .read()
            .applications
            .values()
            .filter(|a| a.applicant_id == applicant)
            .cloned()
            .collect();
        newest_first(&mut apps, |a| (a.created_at, a.id));
        Ok(apps)
    }

    async fn applications_for_owner(&self, owner: Uuid) -> StoreResult<Vec<Application>> {
        let tables = self.tables.read();
        let owned: HashSet<Uuid> = tables
            .listings
            .values()
            .filter(|l| l.owner_user_id == owner)
            .map(|l| l.id)
            .collect();
        let mut apps: Vec<Application> = tables
            .applications
            .values()
            .filter(|a| owned.contains(&a.listing_id))
            .cloned()
            .collect();
        newest_first(&mut apps, |a| (a.created_at, a.id));
        Ok(apps)
    }

    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        self.tables.write().messages.push(message.clone());
        Ok(())
    }

    async fn messages_involving(&self, user: Uuid) -> StoreResult<Vec<Message>> {
        Ok(self
            .tables
            .read()
            .messages
            .iter()
            .filter(|m| m.sender_id == user || m.recipient_id == user)
            .cloned()
            .collect())
    }

    async fn thread_messages(
        &self,
        listing_id: Uuid,
        a: Uuid,
        b: Uuid,
    ) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .tables
            .read()
            .messages
            .iter()
            .filter(|m| {
                m.listing_id == listing_id
                    && ((m.sender_id == a && m.recipient_id == b)
                        || (m.sender_id == b && m.recipient_id == a))
            })
            .cloned()
            .collect();
        messages.sort_by(|x, y| (x.created_at, x.id).cmp(&(y.created_at, y.id)));
        Ok(messages)
    }

    async fn mark_thread_read(
        &self,
        listing_id: Uuid,
        reader: Uuid,
        other: Uuid,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut tables = self.tables.write();
        let mut updated = 0;
        for message in tables.messages.iter_mut().filter(|m| {
            m.listing_id == listing_id
                && m.recipient_id == reader
                && m.sender_id == other
                && m.read_at.is_none()
        }) {
            message.read_at = Some(at);
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_viewing(&self, viewing: &Viewing) -> StoreResult<()> {
        self.tables.write().viewings.insert(viewing.id, viewing.clone());
        Ok(())
    }

    async fn update_viewing(&self, viewing: &Viewing, expected: ViewingStatus) -> StoreResult<()> {
        let mut tables = self.tables.write();
        match tables.viewings.get_mut(&viewing.id) {
            Some(existing) if existing.status == expected => {
                *existing = viewing.clone();
                Ok(())
            }
            Some(_) => Err(StoreError::Conflict(
                "Viewing was changed by another request".into(),
            )),
            None => Err(StoreError::NotFound("Viewing")),
        }
    }

    async fn find_viewing(&self, id: Uuid) -> StoreResult<Option<Viewing>> {
        Ok(self.tables.read().viewings.get(&id).cloned())
    }

    async fn viewings_for_user(&self, user: Uuid) -> StoreResult<Vec<Viewing>> {
        let mut viewings: Vec<Viewing> = self
            .tables
            .read()
            .viewings
            .values()
            .filter(|v| v.seeker_id == user || v.lister_id == user)
            .cloned()
            .collect();
        viewings.sort_by(|a, b| (a.scheduled_at, a.id).cmp(&(b.scheduled_at, b.id)));
        Ok(viewings)
    }

    async fn find_saved(
        &self,
        user: Uuid,
        listing_id: Uuid,
    ) -> StoreResult<Option<SavedListing>> {
        Ok(self.tables.read().saved.get(&(user, listing_id)).cloned())
    }

    async fn upsert_saved(&self, saved: &SavedListing) -> StoreResult<()> {
        self.tables
            .write()
            .saved
            .insert((saved.user_id, saved.listing_id), saved.clone());
        Ok(())
    }

    async fn delete_saved(&self, user: Uuid, listing_id: Uuid) -> StoreResult<bool> {
        Ok(self.tables.write().saved.remove(&(user, listing_id)).is_some())
    }

    async fn saved_by_user(&self, user: Uuid) -> StoreResult<Vec<SavedListing>> {
        let mut saved: Vec<SavedListing> = self
            .tables
            .read()
            .saved
            .values()
            .filter(|s| s.user_id == user)
            .cloned()
            .collect();
        newest_first(&mut saved, |s| (s.saved_at, s.listing_id));
        Ok(saved)
    }

    async fn put_otp_challenge(&self, challenge: &OtpChallenge) -> StoreResult<()> {
        self.tables
            .write()
            .otp_challenges
            .insert(challenge.phone.clone(), challenge.clone());
        Ok(())
    }

    async fn find_otp_challenge(&self, phone: &str) -> StoreResult<Option<OtpChallenge>> {
        Ok(self.tables.read().otp_challenges.get(phone).cloned())
    }

    async fn consume_otp_challenge(
        &self,
        phone: &str,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let matches = tables
            .otp_challenges
            .get(phone)
            .is_some_and(|c| c.code_hash == code_hash && !c.is_expired(now));
        if matches {
            tables.otp_challenges.remove(phone);
        }
        Ok(matches)
    }

    async fn record_otp_failure(
        &self,
        phone: &str,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<i32>> {
        let mut tables = self.tables.write();
        let Some(challenge) = tables.otp_challenges.get_mut(phone) else {
            return Ok(None);
        };
        if challenge.is_expired(now) {
            tables.otp_challenges.remove(phone);
            return Ok(None);
        }
        challenge.attempts += 1;
        let attempts = challenge.attempts;
        if attempts >= max_attempts {
            tables.otp_challenges.remove(phone);
        }
        Ok(Some(attempts))
    }

    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write();
        let now = Utc::now();
        tables.revoked_tokens.retain(|_, exp| *exp > now);
        Ok(tables.revoked_tokens.insert(jti, expires_at).is_none())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> StoreResult<bool> {
        Ok(self.tables.read().revoked_tokens.contains_key(&jti))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listings::tests::sample_listing;
    use crate::domain::listings::ListingStatus;
    use crate::domain::users::Role;

    #[tokio::test]
    async fn duplicate_phone_is_a_conflict() {
        let store = MemoryStore::new();
        let user = User::new("+972501234567".into(), None, Role::Seeker);
        store.insert_user(&user).await.unwrap();

        let twin = User::new("+972501234567".into(), None, Role::Lister);
        let err = store.insert_user(&twin).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn search_counts_all_matches_before_paging() {
        let store = MemoryStore::new();
        for i in 0..5 {
            let mut listing = sample_listing();
            listing.status = ListingStatus::Active;
            listing.rent = 3000 + i * 100;
            store.insert_listing(&listing).await.unwrap();
        }
        store.insert_listing(&sample_listing()).await.unwrap();

        let page = store
            .search_listings(&ListingFilter::default(), SortBy::PriceAsc, 2, 2)
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].rent, 3200);
    }

    #[tokio::test]
    async fn deleting_a_listing_cascades() {
        let store = MemoryStore::new();
        let listing = sample_listing();
        store.insert_listing(&listing).await.unwrap();
        let user = Uuid::new_v4();
        store
            .upsert_saved(&SavedListing {
                user_id: user,
                listing_id: listing.id,
                notifications: true,
                saved_at: Utc::now(),
            })
            .await
            .unwrap();

        store.delete_listing(listing.id).await.unwrap();
        assert!(store.saved_by_user(user).await.unwrap().is_empty());
        assert!(matches!(
            store.delete_listing(listing.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_update_keeps_view_count() {
        let store = MemoryStore::new();
        let listing = sample_listing();
        store.insert_listing(&listing).await.unwrap();
        store.increment_listing_views(listing.id).await.unwrap();

        // A stale copy read before the view was counted
        let mut edited = listing.clone();
        edited.rent = 2900;
        store.update_listing(&edited).await.unwrap();

        let stored = store.find_listing(listing.id).await.unwrap().unwrap();
        assert_eq!(stored.rent, 2900);
        assert_eq!(stored.view_count, 1);
    }

    #[tokio::test]
    async fn application_update_requires_expected_status() {
        use crate::domain::applications::Decision;

        let store = MemoryStore::new();
        let application = Application::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "I would like to rent the room".into(),
            None,
        );
        store.insert_application(&application).await.unwrap();

        let mut withdrawn = application.clone();
        withdrawn.withdraw().unwrap();
        store
            .update_application(&withdrawn, ApplicationStatus::Pending)
            .await
            .unwrap();

        // Decided from a copy read before the withdrawal landed
        let mut accepted = application.clone();
        accepted.decide(Decision::Accepted).unwrap();
        let err = store
            .update_application(&accepted, ApplicationStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let stored = store.find_application(application.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Withdrawn);
    }

    #[tokio::test]
    async fn viewing_update_requires_expected_status() {
        use crate::domain::viewings::{CreateViewingRequest, ViewingKind};

        let store = MemoryStore::new();
        let viewing = CreateViewingRequest {
            scheduled_at: Utc::now() + chrono::Duration::days(1),
            duration_minutes: None,
            kind: ViewingKind::Physical,
            meeting_url: None,
            note: None,
        }
        .into_viewing(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.insert_viewing(&viewing).await.unwrap();

        let mut cancelled = viewing.clone();
        cancelled.status = ViewingStatus::Cancelled;
        store
            .update_viewing(&cancelled, ViewingStatus::Pending)
            .await
            .unwrap();

        let mut confirmed = viewing.clone();
        confirmed.status = ViewingStatus::Confirmed;
        let err = store
            .update_viewing(&confirmed, ViewingStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let stored = store.find_viewing(viewing.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ViewingStatus::Cancelled);
    }

    #[tokio::test]
    async fn revoking_twice_reports_already_revoked() {
        let store = MemoryStore::new();
        let jti = Uuid::new_v4();
        let expires_at = Utc::now() + chrono::Duration::hours(1);

        assert!(store.revoke_token(jti, expires_at).await.unwrap());
        assert!(!store.revoke_token(jti, expires_at).await.unwrap());
        assert!(store.is_token_revoked(jti).await.unwrap());
    }
}
