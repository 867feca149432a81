//! Rental applications

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::listings::ListingSummary;
use super::validation::{error, validate_with, ValidateRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "withdrawn" => Some(Self::Withdrawn),
            _ => None,
        }
    }

    /// Withdrawn applications don't block a new one for the same listing.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Withdrawn)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub applicant_id: Uuid,
    pub message: String,
    pub preferred_move_in: Option<DateTime<Utc>>,
    pub status: ApplicationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn new(
        listing_id: Uuid,
        applicant_id: Uuid,
        message: String,
        preferred_move_in: Option<DateTime<Utc>>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            listing_id,
            applicant_id,
            message,
            preferred_move_in,
            status: ApplicationStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Owner decision. Only pending applications can be decided.
    pub fn decide(&mut self, decision: Decision) -> Result<(), ApplicationStatus> {
        if self.status != ApplicationStatus::Pending {
            return Err(self.status);
        }
        self.status = match decision {
            Decision::Accepted => ApplicationStatus::Accepted,
            Decision::Rejected => ApplicationStatus::Rejected,
        };
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn withdraw(&mut self) -> Result<(), ApplicationStatus> {
        if !matches!(
            self.status,
            ApplicationStatus::Pending | ApplicationStatus::Accepted
        ) {
            return Err(self.status);
        }
        self.status = ApplicationStatus::Withdrawn;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    pub message: String,
    #[serde(default)]
    pub preferred_move_in: Option<DateTime<Utc>>,
}

impl ValidateRequest for CreateApplicationRequest {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        validate_with(self, |errors| {
            let len = self.message.trim().chars().count();
            if !(10..=1000).contains(&len) {
                errors.add(
                    "message",
                    error("length", "Message must be 10-1000 characters"),
                );
            }
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DecisionRequest {
    pub status: Decision,
}

impl ValidateRequest for DecisionRequest {}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationQuery {
    #[serde(default)]
    pub status: Option<ApplicationStatus>,
    #[serde(default)]
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<u32>,
    #[serde(default)]
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<u32>,
}

impl ValidateRequest for ApplicationQuery {}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub withdrawn: usize,
}

impl ApplicationStats {
    pub fn tally<'a>(applications: impl IntoIterator<Item = &'a Application>) -> Self {
        let mut stats = Self::default();
        for app in applications {
            stats.total += 1;
            match app.status {
                ApplicationStatus::Pending => stats.pending += 1,
                ApplicationStatus::Accepted => stats.accepted += 1,
                ApplicationStatus::Rejected => stats.rejected += 1,
                ApplicationStatus::Withdrawn => stats.withdrawn += 1,
            }
        }
        stats
    }
}

/// Application as shown in a list, with its listing and the other party.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    #[serde(flatten)]
    pub application: Application,
    pub listing: Option<ListingSummary>,
    pub counterpart_name: Option<String>,
}
