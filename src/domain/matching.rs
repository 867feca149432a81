//! Profile-to-listing compatibility scoring
//!
//! `score` is a pure function of a seeker profile and a listing. Each
//! component is reported separately so clients can explain the match.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use super::listings::Listing;
use super::profiles::{Guests, Pets, Profile, Smoking};
use super::validation::ValidateRequest;

pub const BUDGET_WEIGHT: i32 = 35;
pub const AREA_WEIGHT: i32 = 25;
pub const OCCUPANCY_WEIGHT: i32 = 15;
pub const TIMING_WEIGHT: i32 = 15;
pub const LIFESTYLE_WEIGHT: i32 = 10;

/// Partial credit when rent is under the seeker's minimum
const BELOW_BUDGET_SCORE: i32 = 25;
/// Partial credit when rent is at most 10% over the seeker's maximum
const STRETCH_BUDGET_SCORE: i32 = 15;

pub const DEFAULT_MIN_SCORE: i32 = 50;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub budget: i32,
    pub area: i32,
    pub occupancy: i32,
    pub timing: i32,
    pub lifestyle: i32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> i32 {
        (self.budget + self.area + self.occupancy + self.timing + self.lifestyle).clamp(0, 100)
    }
}

pub fn score(profile: &Profile, listing: &Listing) -> ScoreBreakdown {
    ScoreBreakdown {
        budget: budget_score(profile, listing.rent),
        area: area_score(profile, &listing.neighborhood),
        occupancy: match profile.occupancy_type {
            Some(t) if t == listing.listing_type => OCCUPANCY_WEIGHT,
            _ => 0,
        },
        timing: match profile.move_in_latest {
            Some(latest) if listing.available_from <= latest => TIMING_WEIGHT,
            _ => 0,
        },
        lifestyle: lifestyle_score(profile, listing.policies.as_ref()),
    }
}

fn budget_score(profile: &Profile, rent: i32) -> i32 {
    let (Some(min), Some(max)) = (profile.budget_min, profile.budget_max) else {
        return 0;
    };

    if rent >= min && rent <= max {
        BUDGET_WEIGHT
    } else if rent < min {
        BELOW_BUDGET_SCORE
    } else if (rent as i64) * 10 <= (max as i64) * 11 {
        STRETCH_BUDGET_SCORE
    } else {
        0
    }
}

fn area_score(profile: &Profile, neighborhood: &str) -> i32 {
    let neighborhood = neighborhood.trim().to_lowercase();
    if profile
        .areas
        .iter()
        .any(|a| a.trim().to_lowercase() == neighborhood)
    {
        AREA_WEIGHT
    } else {
        0
    }
}

/// Share of the listing's house rules the seeker is compatible with.
fn lifestyle_score(profile: &Profile, policies: Option<&Value>) -> i32 {
    let Some(policies) = policies.and_then(Value::as_object) else {
        return LIFESTYLE_WEIGHT;
    };

    let lifestyle = &profile.lifestyle;
    let mut checked = 0;
    let mut compatible = 0;

    if let Some(policy) = policies.get("smoking").and_then(Value::as_str) {
        checked += 1;
        let rejects = policy == "no"
            && matches!(lifestyle.smoking, Some(Smoking::Occasional | Smoking::Regular));
        if !rejects {
            compatible += 1;
        }
    }

    if let Some(policy) = policies.get("pets").and_then(Value::as_str) {
        checked += 1;
        let rejects = match policy {
            "no" => matches!(lifestyle.pets, Some(Pets::Cats | Pets::Dogs | Pets::Both)),
            "cats_allowed" => matches!(lifestyle.pets, Some(Pets::Dogs | Pets::Both)),
            "dogs_allowed" => matches!(lifestyle.pets, Some(Pets::Cats | Pets::Both)),
            _ => false,
        };
        if !rejects {
            compatible += 1;
        }
    }

    if let Some(policy) = policies.get("guests").and_then(Value::as_str) {
        checked += 1;
        let rejects = policy == "rarely" && lifestyle.guests == Some(Guests::Frequently);
        if !rejects {
            compatible += 1;
        }
    }

    if checked == 0 {
        return LIFESTYLE_WEIGHT;
    }
    (compatible as f64 / checked as f64 * LIFESTYLE_WEIGHT as f64).round() as i32
}

/// `GET /api/me/matches` query string
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchQuery {
    #[serde(default)]
    #[validate(range(min = 0, max = 100, message = "minScore must be between 0 and 100"))]
    pub min_score: Option<i32>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
}

impl ValidateRequest for MatchQuery {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub listing: Listing,
    pub score: i32,
    pub breakdown: ScoreBreakdown,
}

/// Score every listing, keep those at or above `min_score`, best first.
pub fn rank(profile: &Profile, listings: Vec<Listing>, min_score: i32) -> Vec<MatchResult> {
    let mut results: Vec<MatchResult> = listings
        .into_iter()
        .map(|listing| {
            let breakdown = score(profile, &listing);
            MatchResult {
                score: breakdown.total(),
                breakdown,
                listing,
            }
        })
        .filter(|m| m.score >= min_score)
        .collect();

    results.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.listing.rent.cmp(&b.listing.rent))
            .then_with(|| a.listing.id.cmp(&b.listing.id))
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listings::tests::sample_listing;
    use crate::domain::listings::{HousingType, ListingStatus};
    use crate::domain::profiles::tests::sample_request;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn fixtures() -> (Profile, Listing) {
        let profile = sample_request().into_profile(Uuid::new_v4());
        let mut listing = sample_listing();
        listing.status = ListingStatus::Active;
        listing.available_from = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        (profile, listing)
    }

    #[test]
    fn perfect_match_scores_100() {
        let (profile, listing) = fixtures();
        let breakdown = score(&profile, &listing);
        assert_eq!(
            breakdown,
            ScoreBreakdown {
                budget: 35,
                area: 25,
                occupancy: 15,
                timing: 15,
                lifestyle: 10,
            }
        );
        assert_eq!(breakdown.total(), 100);
    }

    #[test]
    fn budget_bands() {
        let (profile, mut listing) = fixtures();

        listing.rent = 2000;
        assert_eq!(score(&profile, &listing).budget, 25);

        // 10% over 4500
        listing.rent = 4950;
        assert_eq!(score(&profile, &listing).budget, 15);

        listing.rent = 4951;
        assert_eq!(score(&profile, &listing).budget, 0);
    }

    #[test]
    fn area_match_ignores_case_and_whitespace() {
        let (profile, mut listing) = fixtures();
        listing.neighborhood = "  german colony ".into();
        assert_eq!(score(&profile, &listing).area, 25);

        listing.neighborhood = "Talpiot".into();
        assert_eq!(score(&profile, &listing).area, 0);
    }

    #[test]
    fn late_availability_loses_timing() {
        let (profile, mut listing) = fixtures();
        listing.available_from = profile.move_in_latest.unwrap() + Duration::days(1);
        assert_eq!(score(&profile, &listing).timing, 0);

        listing.listing_type = HousingType::Apartment;
        assert_eq!(score(&profile, &listing).occupancy, 0);
    }

    #[test]
    fn lifestyle_counts_compatible_policies() {
        let (mut profile, mut listing) = fixtures();
        profile.lifestyle.pets = Some(Pets::Dogs);
        profile.lifestyle.guests = Some(Guests::Frequently);

        listing.policies = Some(json!({
            "smoking": "no",
            "pets": "cats_allowed",
            "guests": "rarely"
        }));
        // one of three
        assert_eq!(score(&profile, &listing).lifestyle, 3);

        listing.policies = Some(json!({ "pets": "dogs_allowed" }));
        assert_eq!(score(&profile, &listing).lifestyle, 10);

        listing.policies = Some(json!({ "parking": "street" }));
        assert_eq!(score(&profile, &listing).lifestyle, 10);
    }

    #[test]
    fn rank_filters_and_orders() {
        let (profile, listing) = fixtures();

        let mut cheaper = listing.clone();
        cheaper.id = Uuid::new_v4();
        cheaper.rent = 3000;

        let mut far = listing.clone();
        far.id = Uuid::new_v4();
        far.neighborhood = "Talpiot".into();
        far.listing_type = HousingType::Apartment;
        far.rent = 9000;

        let ranked = rank(&profile, vec![listing.clone(), far, cheaper.clone()], 50);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].listing.id, cheaper.id);
        assert_eq!(ranked[1].listing.id, listing.id);
    }
}
