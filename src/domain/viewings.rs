//! Viewing appointments
//!
//! Seekers request a viewing, the lister confirms it, either side can cancel
//! and the lister marks it completed once it has started. The seeker may
//! move a pending or confirmed viewing to a new time, which puts it back to
//! pending for the lister to confirm again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::listings::ListingSummary;
use super::validation::{error, validate_http_url, validate_with, ValidateRequest};
use crate::error::ApiError;

pub const DEFAULT_DURATION_MINUTES: i32 = 30;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ViewingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ViewingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "cancelled" => Some(Self::Cancelled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewingKind {
    Physical,
    Virtual,
}

impl ViewingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Physical => "physical",
            Self::Virtual => "virtual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "physical" => Some(Self::Physical),
            "virtual" => Some(Self::Virtual),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewing {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub seeker_id: Uuid,
    pub lister_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    pub duration_minutes: i32,
    pub kind: ViewingKind,
    pub meeting_url: Option<String>,
    pub status: ViewingStatus,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which side of a viewing the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    Seeker,
    Lister,
    Admin,
}

impl Viewing {
    pub fn party(&self, user: Uuid, is_admin: bool) -> Option<Party> {
        if user == self.seeker_id {
            Some(Party::Seeker)
        } else if user == self.lister_id {
            Some(Party::Lister)
        } else if is_admin {
            Some(Party::Admin)
        } else {
            None
        }
    }

    /// Apply a status change requested by `party` at `now`.
    pub fn transition(
        &mut self,
        party: Party,
        request: &ViewingStatusRequest,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        use ViewingStatus::*;

        match request.status {
            Confirmed => {
                if party == Party::Seeker {
                    return Err(TransitionError::Forbidden("Only the lister can confirm a viewing"));
                }
                if self.status != Pending {
                    return Err(TransitionError::invalid(self.status, Confirmed));
                }
            }
            Cancelled => {
                if !self.status.is_open() {
                    return Err(TransitionError::invalid(self.status, Cancelled));
                }
            }
            Completed => {
                if party == Party::Seeker {
                    return Err(TransitionError::Forbidden("Only the lister can complete a viewing"));
                }
                if self.status != Confirmed {
                    return Err(TransitionError::invalid(self.status, Completed));
                }
                if now < self.scheduled_at {
                    return Err(TransitionError::Conflict(
                        "A viewing cannot be completed before it starts".to_string(),
                    ));
                }
            }
            Pending => {
                if party == Party::Lister {
                    return Err(TransitionError::Forbidden("Only the seeker can reschedule a viewing"));
                }
                if !self.status.is_open() {
                    return Err(TransitionError::invalid(self.status, Pending));
                }
                let Some(new_time) = request.scheduled_at else {
                    return Err(TransitionError::Field(
                        "scheduled_at",
                        "A new time is required to reschedule",
                    ));
                };
                if new_time <= now {
                    return Err(TransitionError::Field(
                        "scheduled_at",
                        "Viewing must be scheduled in the future",
                    ));
                }
                self.scheduled_at = new_time;
            }
        }

        self.status = request.status;
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    Forbidden(&'static str),
    Conflict(String),
    Field(&'static str, &'static str),
}

impl TransitionError {
    fn invalid(from: ViewingStatus, to: ViewingStatus) -> Self {
        Self::Conflict(format!(
            "Cannot change viewing from {} to {}",
            from.as_str(),
            to.as_str()
        ))
    }
}

impl From<TransitionError> for ApiError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Forbidden(msg) => ApiError::forbidden(msg),
            TransitionError::Conflict(msg) => ApiError::conflict(msg),
            TransitionError::Field(field, msg) => ApiError::field(field_key(field), msg),
        }
    }
}

fn field_key(field: &str) -> &str {
    match field {
        "scheduled_at" => "scheduledAt",
        other => other,
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateViewingRequest {
    pub scheduled_at: DateTime<Utc>,
    #[serde(default)]
    #[validate(range(min = 15, max = 120, message = "Duration must be 15-120 minutes"))]
    pub duration_minutes: Option<i32>,
    pub kind: ViewingKind,
    #[serde(default)]
    #[validate(custom(function = "validate_http_url"))]
    pub meeting_url: Option<String>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
}

impl ValidateRequest for CreateViewingRequest {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        validate_with(self, |errors| {
            if self.scheduled_at <= Utc::now() {
                errors.add(
                    "scheduled_at",
                    error("future", "Viewing must be scheduled in the future"),
                );
            }
            if self.kind == ViewingKind::Virtual && self.meeting_url.is_none() {
                errors.add(
                    "meeting_url",
                    error("required", "Virtual viewings need a meeting URL"),
                );
            }
        })
    }
}

impl CreateViewingRequest {
    pub fn into_viewing(self, listing_id: Uuid, seeker_id: Uuid, lister_id: Uuid) -> Viewing {
        let now = Utc::now();
        Viewing {
            id: Uuid::new_v4(),
            listing_id,
            seeker_id,
            lister_id,
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            kind: self.kind,
            meeting_url: self.meeting_url,
            status: ViewingStatus::Pending,
            note: self.note.filter(|n| !n.trim().is_empty()),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ViewingStatusRequest {
    pub status: ViewingStatus,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl ValidateRequest for ViewingStatusRequest {}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ViewingQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: Option<ViewingStatus>,
}

impl ValidateRequest for ViewingQuery {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        validate_with(self, |errors| {
            if let (Some(from), Some(to)) = (self.from, self.to) {
                if from > to {
                    errors.add("from", error("range", "from must not be after to"));
                }
            }
        })
    }
}

impl ViewingQuery {
    pub fn matches(&self, viewing: &Viewing) -> bool {
        self.from.map_or(true, |from| viewing.scheduled_at >= from)
            && self.to.map_or(true, |to| viewing.scheduled_at <= to)
            && self.status.map_or(true, |s| viewing.status == s)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewingView {
    #[serde(flatten)]
    pub viewing: Viewing,
    pub listing: Option<ListingSummary>,
    pub counterpart_name: Option<String>,
}
