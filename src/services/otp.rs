//! One-time password issuance and verification.
//!
//! Codes are six digits. Only `HMAC-SHA256(secret, "phone|code")` is stored,
//! and a challenge is discarded after a successful verify or too many
//! wrong guesses.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use sha2::Sha256;
use std::sync::Arc;

use super::rate_limit::{RateDecision, RateLimiter};
use super::sms::SmsSender;
use crate::config::Settings;
use crate::domain::auth::OtpChallenge;
use crate::error::{ApiError, ApiResult};
use crate::store::Store;

type HmacSha256 = Hmac<Sha256>;

pub struct OtpService {
    store: Arc<dyn Store>,
    sms: Arc<dyn SmsSender>,
    limiter: RateLimiter,
    secret: Vec<u8>,
    ttl: Duration,
    max_attempts: i32,
    expose_debug: bool,
}

/// Last four digits, for logs.
pub fn phone_suffix(phone: &str) -> &str {
    let start = phone.len().saturating_sub(4);
    phone.get(start..).unwrap_or("")
}

impl OtpService {
    pub fn new(settings: &Settings, store: Arc<dyn Store>, sms: Arc<dyn SmsSender>) -> Self {
        Self {
            store,
            sms,
            limiter: RateLimiter::new(
                settings.otp_rate_limit_max,
                std::time::Duration::from_secs(settings.otp_rate_limit_window_seconds),
            ),
            secret: settings.jwt_secret.as_bytes().to_vec(),
            ttl: Duration::seconds(settings.otp_ttl_seconds),
            max_attempts: settings.otp_max_attempts,
            expose_debug: settings.otp_expose_debug,
        }
    }

    fn mac(&self, phone: &str, code: &str) -> ApiResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| ApiError::internal(format!("Invalid OTP key: {}", e)))?;
        mac.update(phone.as_bytes());
        mac.update(b"|");
        mac.update(code.as_bytes());
        Ok(mac)
    }

    fn hash_code(&self, phone: &str, code: &str) -> ApiResult<String> {
        Ok(hex::encode(self.mac(phone, code)?.finalize().into_bytes()))
    }

    /// Issue a fresh code for `phone`. Returns the code itself only when
    /// debug exposure is enabled.
    pub async fn issue(&self, phone: &str) -> ApiResult<Option<String>> {
        if let RateDecision::Limited { retry_after } = self.limiter.check(phone) {
            tracing::warn!(
                phone_suffix = phone_suffix(phone),
                retry_after_secs = retry_after.as_secs(),
                "OTP rate limit exceeded"
            );
            return Err(ApiError::RateLimited(
                "Too many OTP requests. Please try again later.".to_string(),
            ));
        }

        let code = rand::thread_rng().gen_range(100_000..=999_999u32).to_string();

        let challenge = OtpChallenge {
            phone: phone.to_string(),
            code_hash: self.hash_code(phone, &code)?,
            expires_at: Utc::now() + self.ttl,
            attempts: 0,
        };
        self.store.put_otp_challenge(&challenge).await?;

        let body = format!(
            "Your HomeSprint verification code is {}. It expires in {} minutes.",
            code,
            self.ttl.num_minutes().max(1)
        );
        self.sms.send_sms(phone, &body).await.map_err(|e| {
            tracing::error!(phone_suffix = phone_suffix(phone), error = %e, "Failed to send OTP");
            ApiError::Internal(e)
        })?;

        tracing::info!(phone_suffix = phone_suffix(phone), "OTP issued");

        Ok(self.expose_debug.then_some(code))
    }

    /// Check `code` against the outstanding challenge for `phone`.
    ///
    /// Consuming and counting failures are single store operations, so
    /// concurrent guesses can neither exceed the attempt cap nor redeem the
    /// same code twice.
    pub async fn verify(&self, phone: &str, code: &str) -> ApiResult<()> {
        let now = Utc::now();
        let code_hash = self.hash_code(phone, code)?;

        if self
            .store
            .consume_otp_challenge(phone, &code_hash, now)
            .await?
        {
            tracing::info!(phone_suffix = phone_suffix(phone), "OTP verified");
            return Ok(());
        }

        match self
            .store
            .record_otp_failure(phone, self.max_attempts, now)
            .await?
        {
            Some(attempts) if attempts >= self.max_attempts => {
                tracing::warn!(phone_suffix = phone_suffix(phone), "OTP attempts exhausted");
            }
            Some(attempts) => {
                tracing::debug!(phone_suffix = phone_suffix(phone), attempts, "Wrong OTP");
            }
            None => {}
        }
        Err(ApiError::InvalidOtp)
    }
}
