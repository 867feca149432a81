//! User accounts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::profiles::Profile;
use super::validation::{validate_lang, ValidateRequest};

/// Account role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    Seeker,
    Lister,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Seeker => "SEEKER",
            Self::Lister => "LISTER",
            Self::Admin => "ADMIN",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SEEKER" => Some(Self::Seeker),
            "LISTER" => Some(Self::Lister),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedFlags {
    #[serde(default)]
    pub phone_verified: bool,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub lister_verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub phone: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Role,
    pub lang: String,
    pub verified_flags: VerifiedFlags,
    pub profile_completeness: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A freshly phone-verified account.
    pub fn new(phone: String, name: Option<String>, role: Role) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            phone,
            email: None,
            name,
            role,
            lang: "en".to_string(),
            verified_flags: VerifiedFlags {
                phone_verified: true,
                ..VerifiedFlags::default()
            },
            profile_completeness: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            verified_flags: self.verified_flags.clone(),
        }
    }
}

/// Public view of another user (listing owner, applicant, chat counterpart).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub verified_flags: VerifiedFlags,
}

/// `PATCH /api/me`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeRequest {
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[serde(default)]
    #[validate(custom(function = "validate_lang"))]
    pub lang: Option<String>,
}

impl ValidateRequest for UpdateMeRequest {}

impl UpdateMeRequest {
    pub fn apply(self, user: &mut User) {
        if let Some(name) = self.name {
            user.name = Some(name.trim().to_string());
        }
        if let Some(email) = self.email {
            let email = email.trim().to_lowercase();
            if user.email.as_deref() != Some(email.as_str()) {
                // A new address has not been confirmed yet
                user.verified_flags.email_verified = false;
            }
            user.email = Some(email);
        }
        if let Some(lang) = self.lang {
            user.lang = lang;
        }
        user.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub user: User,
    pub profile: Option<Profile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_serializes_as_screaming_case() {
        assert_eq!(serde_json::to_string(&Role::Lister).unwrap(), "\"LISTER\"");
        assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
        assert_eq!(Role::parse("admin"), None);
    }

    #[test]
    fn changing_email_clears_email_verification() {
        let mut user = User::new("+972501234567".into(), None, Role::Seeker);
        user.email = Some("old@example.com".into());
        user.verified_flags.email_verified = true;

        UpdateMeRequest {
            name: None,
            email: Some("New@Example.com".into()),
            lang: None,
        }
        .apply(&mut user);

        assert_eq!(user.email.as_deref(), Some("new@example.com"));
        assert!(!user.verified_flags.email_verified);
        assert!(user.verified_flags.phone_verified);
    }
}
