//! Seeker search profile
//!
//! One profile per user: budget, move-in window, preferred areas and
//! lifestyle answers. The completeness score is copied onto the user row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::listings::HousingType;
use super::validation::{error, validate_areas, validate_with, ValidateRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Smoking {
    No,
    Occasional,
    Regular,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Pets {
    No,
    Cats,
    Dogs,
    Both,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Guests {
    Rarely,
    Occasionally,
    Frequently,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Cleaning {
    VeryImportant,
    SomewhatImportant,
    Flexible,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Noise {
    Quiet,
    Moderate,
    Lively,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Religion {
    Observant,
    Traditional,
    Secular,
}

/// Lifestyle answers. Stored rows may be partial; new writes must answer all six.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lifestyle {
    #[serde(default)]
    pub smoking: Option<Smoking>,
    #[serde(default)]
    pub pets: Option<Pets>,
    #[serde(default)]
    pub guests: Option<Guests>,
    #[serde(default)]
    pub cleaning: Option<Cleaning>,
    #[serde(default)]
    pub noise: Option<Noise>,
    #[serde(default)]
    pub religion: Option<Religion>,
}

impl Lifestyle {
    pub fn answered(&self) -> usize {
        [
            self.smoking.is_some(),
            self.pets.is_some(),
            self.guests.is_some(),
            self.cleaning.is_some(),
            self.noise.is_some(),
            self.religion.is_some(),
        ]
        .iter()
        .filter(|v| **v)
        .count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: Uuid,
    pub budget_min: Option<i32>,
    pub budget_max: Option<i32>,
    pub move_in_earliest: Option<DateTime<Utc>>,
    pub move_in_latest: Option<DateTime<Utc>>,
    pub areas: Vec<String>,
    pub occupancy_type: Option<HousingType>,
    pub lifestyle: Lifestyle,
    pub bio: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Profile completeness, 0..=100.
pub fn completeness(profile: &Profile) -> i32 {
    let mut score = 0;

    if profile.budget_min.is_some() && profile.budget_max.is_some() {
        score += 20;
    }
    if profile.move_in_earliest.is_some() && profile.move_in_latest.is_some() {
        score += 15;
    }
    if !profile.areas.is_empty() {
        score += 15;
    }
    if profile.occupancy_type.is_some() {
        score += 10;
    }

    let answered = profile.lifestyle.answered() as f64;
    score += (answered / 6.0 * 20.0).round() as i32;

    if profile
        .bio
        .as_deref()
        .map(|b| !b.trim().is_empty())
        .unwrap_or(false)
    {
        score += 10;
    }

    score.min(100)
}

/// `PUT /api/me/profile`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpsertProfileRequest {
    #[validate(range(min = 1000, max = 50000, message = "Budget must be between 1000 and 50000"))]
    pub budget_min: i32,
    #[validate(range(min = 1000, max = 50000, message = "Budget must be between 1000 and 50000"))]
    pub budget_max: i32,
    pub move_in_earliest: DateTime<Utc>,
    pub move_in_latest: DateTime<Utc>,
    #[validate(
        length(min = 1, max = 10, message = "Choose between 1 and 10 areas"),
        custom(function = "validate_areas")
    )]
    pub areas: Vec<String>,
    pub occupancy_type: HousingType,
    pub lifestyle: Lifestyle,
    #[serde(default)]
    #[validate(length(max = 500, message = "Bio must be at most 500 characters"))]
    pub bio: Option<String>,
}

impl ValidateRequest for UpsertProfileRequest {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        validate_with(self, |errors| {
            if self.budget_min > self.budget_max {
                errors.add(
                    "budget_min",
                    error(
                        "budget_range",
                        "Minimum budget must be less than or equal to maximum budget",
                    ),
                );
            }
            if self.move_in_earliest > self.move_in_latest {
                errors.add(
                    "move_in_earliest",
                    error(
                        "move_in_range",
                        "Earliest move-in date must be before latest date",
                    ),
                );
            }
            if self.lifestyle.answered() < 6 {
                errors.add(
                    "lifestyle",
                    error("lifestyle", "Every lifestyle question must be answered"),
                );
            }
        })
    }
}

impl UpsertProfileRequest {
    pub fn into_profile(self, user_id: Uuid) -> Profile {
        Profile {
            user_id,
            budget_min: Some(self.budget_min),
            budget_max: Some(self.budget_max),
            move_in_earliest: Some(self.move_in_earliest),
            move_in_latest: Some(self.move_in_latest),
            areas: self.areas.into_iter().map(|a| a.trim().to_string()).collect(),
            occupancy_type: Some(self.occupancy_type),
            lifestyle: self.lifestyle,
            bio: self.bio.filter(|b| !b.trim().is_empty()),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    #[serde(flatten)]
    pub profile: Profile,
    pub completeness: i32,
}

impl From<Profile> for ProfileView {
    fn from(profile: Profile) -> Self {
        let completeness = completeness(&profile);
        Self {
            profile,
            completeness,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;

    pub(crate) fn full_lifestyle() -> Lifestyle {
        Lifestyle {
            smoking: Some(Smoking::No),
            pets: Some(Pets::No),
            guests: Some(Guests::Occasionally),
            cleaning: Some(Cleaning::SomewhatImportant),
            noise: Some(Noise::Moderate),
            religion: Some(Religion::Secular),
        }
    }

    pub(crate) fn sample_request() -> UpsertProfileRequest {
        UpsertProfileRequest {
            budget_min: 3000,
            budget_max: 4500,
            move_in_earliest: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            move_in_latest: Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap(),
            areas: vec!["Rehavia".into(), "German Colony".into()],
            occupancy_type: HousingType::Room,
            lifestyle: full_lifestyle(),
            bio: None,
        }
    }

    #[test]
    fn complete_profile_without_bio_scores_80() {
        let profile = sample_request().into_profile(Uuid::new_v4());
        assert_eq!(completeness(&profile), 80);
    }

    #[test]
    fn bio_adds_ten() {
        let mut request = sample_request();
        request.bio = Some("Quiet grad student".into());
        let profile = request.into_profile(Uuid::new_v4());
        assert_eq!(completeness(&profile), 90);
    }

    #[test]
    fn partial_lifestyle_is_rounded() {
        let mut profile = sample_request().into_profile(Uuid::new_v4());
        profile.lifestyle = Lifestyle {
            smoking: Some(Smoking::No),
            ..Default::default()
        };
        // 20 + 15 + 15 + 10 + round(20/6)
        assert_eq!(completeness(&profile), 63);
    }

    #[test]
    fn budget_and_dates_are_cross_checked() {
        let mut request = sample_request();
        request.budget_min = 5000;
        request.move_in_earliest = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();

        let errors = request.validate_request().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("budget_min"));
        assert!(fields.contains_key("move_in_earliest"));
    }

    #[test]
    fn lifestyle_values_parse_from_snake_case() {
        let lifestyle: Lifestyle = serde_json::from_value(serde_json::json!({
            "smoking": "occasional",
            "pets": "both",
            "guests": "rarely",
            "cleaning": "very_important",
            "noise": "quiet",
            "religion": "observant"
        }))
        .unwrap();
        assert_eq!(lifestyle.answered(), 6);
        assert_eq!(lifestyle.cleaning, Some(Cleaning::VeryImportant));
    }
}
