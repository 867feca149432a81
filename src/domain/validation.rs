//! Shared request validation rules
//!
//! Field-level rules live on the DTOs as `validator` attributes. Rules that
//! span several fields go in `ValidateRequest::validate_request`, which
//! reports them against a concrete field so clients can highlight it.

use std::borrow::Cow;
use validator::{Validate, ValidationError, ValidationErrors};

/// Validation entry point used by the request extractors.
pub trait ValidateRequest: Validate {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        self.validate()
    }
}

/// Run the derived rules and then any cross-field `checks`, merging the results.
pub fn validate_with<T, F>(value: &T, checks: F) -> Result<(), ValidationErrors>
where
    T: Validate,
    F: FnOnce(&mut ValidationErrors),
{
    let mut errors = match value.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };
    checks(&mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

pub fn error(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Israeli mobile numbers in E.164: `+972` followed by nine digits.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let valid = phone
        .strip_prefix("+972")
        .map(|rest| rest.len() == 9 && rest.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(error("phone", "Invalid Israeli phone number"))
    }
}

pub fn validate_otp_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(error("otp", "OTP must be 6 digits"))
    }
}

pub fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(error("url", "Must be a valid http(s) URL")),
    }
}

pub fn validate_photo_urls(photos: &[String]) -> Result<(), ValidationError> {
    for photo in photos {
        validate_http_url(photo).map_err(|_| error("url", "Every photo must be a valid URL"))?;
    }
    Ok(())
}

pub fn validate_areas(areas: &[String]) -> Result<(), ValidationError> {
    if areas.iter().any(|a| a.trim().is_empty() || a.len() > 50) {
        return Err(error("areas", "Areas must be non-empty names of at most 50 characters"));
    }
    Ok(())
}

pub const SUPPORTED_LANGS: [&str; 4] = ["en", "he", "ar", "ru"];

pub fn validate_lang(lang: &str) -> Result<(), ValidationError> {
    if SUPPORTED_LANGS.contains(&lang) {
        Ok(())
    } else {
        Err(error("lang", "Unsupported language"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_requires_israeli_prefix_and_nine_digits() {
        assert!(validate_phone("+972501234567").is_ok());
        assert!(validate_phone("+97250123456").is_err());
        assert!(validate_phone("+9725012345678").is_err());
        assert!(validate_phone("0501234567").is_err());
        assert!(validate_phone("+97250123456a").is_err());
    }

    #[test]
    fn otp_code_is_six_digits() {
        assert!(validate_otp_code("123456").is_ok());
        assert!(validate_otp_code("12345").is_err());
        assert!(validate_otp_code("12345a").is_err());
    }

    #[test]
    fn photo_urls_must_be_http() {
        let ok = vec!["https://images.example.com/a.jpg".to_string()];
        assert!(validate_photo_urls(&ok).is_ok());

        let bad = vec!["ftp://example.com/a.jpg".to_string()];
        assert!(validate_photo_urls(&bad).is_err());

        let garbage = vec!["not a url".to_string()];
        assert!(validate_photo_urls(&garbage).is_err());
    }
}
