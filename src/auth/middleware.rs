use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use super::claims::TokenKind;
use super::tokens::expires_at;
use super::AuthContext;
use crate::app::AppState;
use crate::error::ApiError;

/// Extractor that requires a valid, unrevoked access token
///
/// Example:
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken(String),
    Revoked,
    UnknownUser,
    Internal(anyhow::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let err = match self {
            AuthError::MissingToken => ApiError::unauthorized("Missing authorization token"),
            AuthError::InvalidFormat => ApiError::unauthorized("Invalid authorization format"),
            AuthError::InvalidToken(_) => ApiError::unauthorized("Invalid or expired token"),
            AuthError::Revoked => ApiError::unauthorized("Token has been revoked"),
            AuthError::UnknownUser => ApiError::unauthorized("User no longer exists"),
            AuthError::Internal(e) => ApiError::Internal(e),
        };
        err.into_response()
    }
}

/// The raw token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?;

        let claims = state
            .tokens
            .decode(token, TokenKind::Access)
            .map_err(|e| {
                tracing::warn!(error = %e, "JWT verification failed");
                AuthError::InvalidToken(e.to_string())
            })?;

        let revoked = state
            .store
            .is_token_revoked(claims.jti)
            .await
            .map_err(|e| AuthError::Internal(e.into()))?;
        if revoked {
            tracing::warn!(user_id = %claims.sub, "Revoked token presented");
            return Err(AuthError::Revoked);
        }

        let user = state
            .store
            .find_user(claims.sub)
            .await
            .map_err(|e| AuthError::Internal(e.into()))?
            .ok_or(AuthError::UnknownUser)?;

        Ok(RequireAuth(AuthContext {
            user_id: user.id,
            user,
            jti: claims.jti,
            expires_at: expires_at(&claims),
        }))
    }
}
