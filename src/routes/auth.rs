//! Authentication routes
//!
//! Phone sign-in with a one-time password, then bearer JWTs issued by this
//! service. Refresh tokens rotate; logout revokes by `jti`.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::{SuccessResponse, ValidatedJson};
use crate::app::AppState;
use crate::auth::tokens::expires_at;
use crate::auth::{RequireAuth, TokenKind, TokenPair};
use crate::domain::auth::{
    AuthUser, LogoutRequest, OtpRequest, OtpRequestResponse, OtpVerifyRequest,
    OtpVerifyResponse, RefreshRequest, SessionResponse, TokenResponse,
};
use crate::domain::{Role, User};
use crate::error::ApiError;
use crate::services::otp::phone_suffix;

/// POST /api/auth/otp/request
///
/// Send a six-digit code to the phone number.
pub async fn request_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<OtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let debug_otp = state.otp.issue(&req.phone).await?;

    Ok(Json(OtpRequestResponse {
        success: true,
        message: "Verification code sent".to_string(),
        debug_otp,
    }))
}

/// POST /api/auth/otp/verify
///
/// Exchange a valid code for a token pair, creating the account on first sign-in.
pub async fn verify_otp(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<OtpVerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.role == Some(Role::Admin) {
        return Err(ApiError::forbidden("The ADMIN role cannot be self-assigned"));
    }

    state.otp.verify(&req.phone, &req.otp).await?;

    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    let (user, is_new_user) = match state.store.find_user_by_phone(&req.phone).await? {
        Some(mut user) => {
            user.verified_flags.phone_verified = true;
            if let Some(name) = name {
                user.name = Some(name);
            }
            if let Some(role) = req.role {
                user.role = role;
            }
            user.updated_at = chrono::Utc::now();
            state.store.update_user(&user).await?;
            (user, false)
        }
        None => {
            let user = User::new(req.phone.clone(), name, req.role.unwrap_or_default());
            state.store.insert_user(&user).await?;
            tracing::info!(
                user_id = %user.id,
                role = %user.role,
                phone_suffix = phone_suffix(&req.phone),
                "User created"
            );
            (user, true)
        }
    };

    let profile = state.store.find_profile(user.id).await?;
    let TokenPair {
        access_token,
        refresh_token,
        expires_in,
    } = state.tokens.issue_pair(&user)?;

    tracing::info!(user_id = %user.id, is_new_user, "User signed in");

    let redirect_to = if is_new_user { "/onboarding" } else { "/me" };

    Ok(Json(OtpVerifyResponse {
        success: true,
        access_token,
        refresh_token,
        expires_in,
        user: AuthUser {
            user,
            profile,
            is_new_user,
        },
        redirect_to: redirect_to.to_string(),
    }))
}

/// POST /api/auth/refresh
///
/// Rotate a refresh token: the presented one is revoked and a new pair issued.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = state
        .tokens
        .decode(&req.refresh_token, TokenKind::Refresh)
        .map_err(|e| {
            tracing::warn!(error = %e, "Refresh token rejected");
            ApiError::unauthorized("Invalid or expired refresh token")
        })?;

    let user = state
        .store
        .find_user(claims.sub)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    // Revoking is the rotation step: only the first caller with this jti wins
    let rotated = state
        .store
        .revoke_token(claims.jti, expires_at(&claims))
        .await?;
    if !rotated {
        tracing::warn!(user_id = %claims.sub, "Revoked refresh token presented");
        return Err(ApiError::unauthorized("Refresh token has been revoked"));
    }

    let pair = state.tokens.issue_pair(&user)?;

    tracing::debug!(user_id = %user.id, "Tokens refreshed");

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
    }))
}

/// POST /api/auth/logout
///
/// Revoke the presented access token and, when given, the refresh token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    body: Option<Json<LogoutRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.revoke_token(auth.jti, auth.expires_at).await?;

    if let Some(refresh) = body.and_then(|Json(b)| b.refresh_token) {
        match state.tokens.decode(&refresh, TokenKind::Refresh) {
            Ok(claims) if claims.sub == auth.user_id => {
                state
                    .store
                    .revoke_token(claims.jti, expires_at(&claims))
                    .await?;
            }
            Ok(_) => {
                tracing::warn!(user_id = %auth.user_id, "Logout with another user's refresh token");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid refresh token on logout");
            }
        }
    }

    tracing::info!(user_id = %auth.user_id, "User signed out");

    Ok(SuccessResponse::new("Signed out"))
}

/// GET /api/auth/session
pub async fn get_session(auth: RequireAuth) -> Json<SessionResponse> {
    let RequireAuth(ctx) = auth;
    Json(SessionResponse {
        user: ctx.user,
        expires_at: ctx.expires_at,
    })
}
