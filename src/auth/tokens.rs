//! HS256 access/refresh token issuing and verification

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use super::claims::{Claims, TokenKind};
use crate::config::Settings;
use crate::domain::User;

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenIssuer {
    pub fn new(settings: &Settings) -> Self {
        let secret = settings.jwt_secret.as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: settings.jwt_issuer.clone(),
            audience: settings.jwt_audience.clone(),
            access_ttl: Duration::seconds(settings.access_token_ttl_seconds),
            refresh_ttl: Duration::seconds(settings.refresh_token_ttl_seconds),
        }
    }

    fn issue(&self, user: &User, kind: TokenKind, now: DateTime<Utc>) -> Result<String> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            sub: user.id,
            role: user.role,
            typ: kind,
            jti: Uuid::new_v4(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .context("Failed to sign token")
    }

    pub fn issue_pair(&self, user: &User) -> Result<TokenPair> {
        let now = Utc::now();
        Ok(TokenPair {
            access_token: self.issue(user, TokenKind::Access, now)?,
            refresh_token: self.issue(user, TokenKind::Refresh, now)?,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// Verify signature, expiry, issuer and audience, and that the token is of `kind`.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .context("JWT validation failed")?
            .claims;

        if claims.typ != kind {
            bail!("Expected {:?} token, got {:?}", kind, claims.typ);
        }
        Ok(claims)
    }
}

/// Expiry of a decoded token as a timestamp.
pub fn expires_at(claims: &Claims) -> DateTime<Utc> {
    Utc.timestamp_opt(claims.exp, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&Settings::test_default())
    }

    #[test]
    fn access_token_round_trips_with_claims() {
        let user = User::new("+972501234567".into(), None, Role::Lister);
        let pair = issuer().issue_pair(&user).unwrap();
        assert_eq!(pair.expires_in, 900);

        let claims = issuer().decode(&pair.access_token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Lister);
        assert_eq!(claims.iss, "homesprint");
        assert_eq!(claims.aud, "homesprint-api");
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let user = User::new("+972501234567".into(), None, Role::Seeker);
        let pair = issuer().issue_pair(&user).unwrap();

        assert!(issuer().decode(&pair.refresh_token, TokenKind::Access).is_err());
        assert!(issuer().decode(&pair.access_token, TokenKind::Refresh).is_err());
        assert!(issuer().decode(&pair.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn wrong_secret_or_audience_is_rejected() {
        let user = User::new("+972501234567".into(), None, Role::Seeker);
        let pair = issuer().issue_pair(&user).unwrap();

        let mut other = Settings::test_default();
        other.jwt_secret = "another-secret-that-is-also-long-enough".into();
        assert!(TokenIssuer::new(&other)
            .decode(&pair.access_token, TokenKind::Access)
            .is_err());

        let mut other = Settings::test_default();
        other.jwt_audience = "someone-else".into();
        assert!(TokenIssuer::new(&other)
            .decode(&pair.access_token, TokenKind::Access)
            .is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut settings = Settings::test_default();
        settings.access_token_ttl_seconds = -10;
        let issuer = TokenIssuer::new(&settings);
        let user = User::new("+972501234567".into(), None, Role::Seeker);
        let pair = issuer.issue_pair(&user).unwrap();
        assert!(issuer.decode(&pair.access_token, TokenKind::Access).is_err());
    }
}
