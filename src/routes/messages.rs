//! Messaging between a listing's owner and interested users.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, PageQuery, PageRequest, PaginationMeta, ValidatedJson, ValidatedQuery};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::messages::{build_threads, SendMessageRequest, ThreadView};
use crate::domain::Message;
use crate::error::ApiError;
use crate::routes::listings::fetch_listing;
use crate::routes::{listings_by_id, users_by_id};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: Message,
}

#[derive(Debug, Serialize)]
pub struct ThreadsResponse {
    pub threads: Vec<ThreadView>,
}

#[derive(Debug, Serialize)]
pub struct ThreadMessagesResponse {
    pub messages: Vec<Message>,
    pub pagination: PaginationMeta,
}

/// POST /api/messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    ValidatedJson(req): ValidatedJson<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.recipient_id == auth.user_id {
        return Err(ApiError::bad_request("You cannot message yourself"));
    }

    let listing = fetch_listing(&state, req.listing_id).await?;

    let sender_is_owner = listing.owner_user_id == auth.user_id;
    let recipient_is_owner = listing.owner_user_id == req.recipient_id;
    if sender_is_owner == recipient_is_owner {
        return Err(ApiError::bad_request(
            "Messages must be between the listing owner and another user",
        ));
    }

    if state.store.find_user(req.recipient_id).await?.is_none() {
        return Err(ApiError::not_found("Recipient not found"));
    }

    let message = Message::new(
        req.listing_id,
        auth.user_id,
        req.recipient_id,
        req.body.trim().to_string(),
    );
    state.store.insert_message(&message).await?;

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %req.listing_id,
        message_id = %message.id,
        "Message sent"
    );

    Ok(Created(MessageResponse { message }))
}

/// GET /api/messages/threads
pub async fn list_threads(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let messages = state.store.messages_involving(auth.user_id).await?;
    let digests = build_threads(auth.user_id, messages);

    let listing_ids: Vec<Uuid> = digests.iter().map(|t| t.key.listing_id).collect();
    let user_ids: Vec<Uuid> = digests.iter().map(|t| t.key.counterpart_id).collect();
    let (listings, users) = tokio::try_join!(
        listings_by_id(&state, &listing_ids),
        users_by_id(&state, &user_ids),
    )?;

    let threads = digests
        .into_iter()
        .map(|t| ThreadView {
            listing_id: t.key.listing_id,
            listing: listings.get(&t.key.listing_id).map(|l| l.summary()),
            counterpart: users.get(&t.key.counterpart_id).map(|u| u.summary()),
            last_message: t.last_message,
            unread_count: t.unread_count,
        })
        .collect();

    Ok(Json(ThreadsResponse { threads }))
}

/// GET /api/messages/threads/:listing_id/:user_id
///
/// Messages oldest first. Marks everything addressed to the caller as read.
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path((listing_id, other_id)): Path<(Uuid, Uuid)>,
    ValidatedQuery(query): ValidatedQuery<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    fetch_listing(&state, listing_id).await?;

    let now = Utc::now();
    let mut messages = state
        .store
        .thread_messages(listing_id, auth.user_id, other_id)
        .await?;
    let marked = state
        .store
        .mark_thread_read(listing_id, auth.user_id, other_id, now)
        .await?;

    for message in messages.iter_mut() {
        if message.is_unread_by(auth.user_id) {
            message.read_at = Some(now);
        }
    }

    if marked > 0 {
        tracing::debug!(user_id = %auth.user_id, listing_id = %listing_id, marked, "Thread read");
    }

    let page = PageRequest::from(query);
    let total = messages.len() as u64;

    Ok(Json(ThreadMessagesResponse {
        messages: page.slice(messages),
        pagination: PaginationMeta::new(page, total),
    }))
}
