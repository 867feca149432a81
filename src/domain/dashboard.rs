//! Role-dependent dashboard summaries

use serde::Serialize;

use super::applications::ApplicationStats;
use super::listings::{Listing, ListingStatus};
use super::viewings::ViewingView;

/// How many upcoming viewings the dashboard shows
pub const UPCOMING_VIEWINGS: usize = 5;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum Dashboard {
    Seeker(SeekerDashboard),
    Lister(ListerDashboard),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeekerDashboard {
    pub profile_completeness: i32,
    pub has_profile: bool,
    pub applications: ApplicationStats,
    pub upcoming_viewings: Vec<ViewingView>,
    pub saved_count: usize,
    pub unread_messages: usize,
    pub match_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListerDashboard {
    pub listings: ListingCounts,
    pub total_views: i64,
    pub applications: ApplicationStats,
    pub upcoming_viewings: Vec<ViewingView>,
    pub unread_messages: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListingCounts {
    pub total: usize,
    pub draft: usize,
    pub active: usize,
    pub paused: usize,
    pub filled: usize,
}

impl ListingCounts {
    pub fn tally<'a>(listings: impl IntoIterator<Item = &'a Listing>) -> Self {
        let mut counts = Self::default();
        for listing in listings {
            counts.total += 1;
            match listing.status {
                ListingStatus::Draft => counts.draft += 1,
                ListingStatus::Active => counts.active += 1,
                ListingStatus::Paused => counts.paused += 1,
                ListingStatus::Filled => counts.filled += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listings::tests::sample_listing;

    #[test]
    fn listing_counts_by_status() {
        let draft = sample_listing();
        let mut active = sample_listing();
        active.status = ListingStatus::Active;
        let mut filled = sample_listing();
        filled.status = ListingStatus::Filled;

        let counts = ListingCounts::tally([&draft, &active, &filled]);
        assert_eq!(
            counts,
            ListingCounts {
                total: 3,
                draft: 1,
                active: 1,
                paused: 0,
                filled: 1,
            }
        );
    }
}
