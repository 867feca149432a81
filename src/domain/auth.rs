//! Authentication domain types
//!
//! Phone + one-time password sign-in and the token pair handed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::profiles::Profile;
use super::users::{Role, User};
use super::validation::{validate_otp_code, validate_phone, ValidateRequest};

/// `POST /api/auth/otp/request`
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct OtpRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

impl ValidateRequest for OtpRequest {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpRequestResponse {
    pub success: bool,
    pub message: String,
    /// Only present when debug codes are exposed (development)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_otp: Option<String>,
}

/// `POST /api/auth/otp/verify`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(custom(function = "validate_otp_code"))]
    pub otp: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl ValidateRequest for OtpVerifyRequest {}

/// User payload returned after sign-in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    #[serde(flatten)]
    pub user: User,
    pub profile: Option<Profile>,
    pub is_new_user: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OtpVerifyResponse {
    pub success: bool,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: AuthUser,
    pub redirect_to: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

impl ValidateRequest for RefreshRequest {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl ValidateRequest for LogoutRequest {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: User,
    pub expires_at: DateTime<Utc>,
}

/// Outstanding OTP for a phone number. Only the HMAC of the code is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpChallenge {
    pub phone: String,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
}

impl OtpChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
