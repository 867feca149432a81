//! Direct messages between a seeker and a listing owner
//!
//! A thread is every message on one listing between the same two people.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use super::listings::ListingSummary;
use super::users::UserSummary;
use super::validation::{error, validate_with, ValidateRequest};

pub const MAX_BODY_CHARS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub listing_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(listing_id: Uuid, sender_id: Uuid, recipient_id: Uuid, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            listing_id,
            sender_id,
            recipient_id,
            body,
            created_at: Utc::now(),
            read_at: None,
        }
    }

    /// The other participant from `user`'s point of view.
    pub fn counterpart(&self, user: Uuid) -> Uuid {
        if self.sender_id == user {
            self.recipient_id
        } else {
            self.sender_id
        }
    }

    pub fn is_unread_by(&self, user: Uuid) -> bool {
        self.recipient_id == user && self.read_at.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub listing_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
}

impl ValidateRequest for SendMessageRequest {
    fn validate_request(&self) -> Result<(), ValidationErrors> {
        validate_with(self, |errors| {
            let len = self.body.trim().chars().count();
            if len == 0 {
                errors.add("body", error("required", "Message must not be empty"));
            } else if len > MAX_BODY_CHARS {
                errors.add(
                    "body",
                    error("length", "Message must be at most 2000 characters"),
                );
            }
        })
    }
}

/// Key identifying a thread from one participant's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadKey {
    pub listing_id: Uuid,
    pub counterpart_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct ThreadDigest {
    pub key: ThreadKey,
    pub last_message: Message,
    pub unread_count: usize,
}

/// Group `messages` involving `user` into threads, newest activity first.
pub fn build_threads(user: Uuid, messages: Vec<Message>) -> Vec<ThreadDigest> {
    let mut threads: HashMap<ThreadKey, ThreadDigest> = HashMap::new();

    for message in messages {
        if message.sender_id != user && message.recipient_id != user {
            continue;
        }
        let key = ThreadKey {
            listing_id: message.listing_id,
            counterpart_id: message.counterpart(user),
        };
        let unread = usize::from(message.is_unread_by(user));

        match threads.get_mut(&key) {
            Some(thread) => {
                thread.unread_count += unread;
                if (message.created_at, message.id)
                    > (thread.last_message.created_at, thread.last_message.id)
                {
                    thread.last_message = message;
                }
            }
            None => {
                threads.insert(
                    key,
                    ThreadDigest {
                        key,
                        last_message: message,
                        unread_count: unread,
                    },
                );
            }
        }
    }

    let mut threads: Vec<ThreadDigest> = threads.into_values().collect();
    threads.sort_by(|a, b| {
        b.last_message
            .created_at
            .cmp(&a.last_message.created_at)
            .then_with(|| b.last_message.id.cmp(&a.last_message.id))
    });
    threads
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadView {
    pub listing_id: Uuid,
    pub listing: Option<ListingSummary>,
    pub counterpart: Option<UserSummary>,
    pub last_message: Message,
    pub unread_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn threads_group_by_listing_and_counterpart() {
        let me = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let listing = Uuid::new_v4();

        let mut first = Message::new(listing, me, owner, "Is it available?".into());
        first.created_at = Utc::now() - Duration::minutes(10);
        let reply = Message::new(listing, owner, me, "Yes!".into());
        let unrelated = Message::new(listing, other, owner, "Hi".into());
        let mut elsewhere = Message::new(Uuid::new_v4(), other, me, "Hello".into());
        elsewhere.created_at = Utc::now() - Duration::hours(1);

        let threads = build_threads(me, vec![first, reply.clone(), unrelated, elsewhere]);

        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].key.counterpart_id, owner);
        assert_eq!(threads[0].last_message.id, reply.id);
        assert_eq!(threads[0].unread_count, 1);
        assert_eq!(threads[1].key.counterpart_id, other);
    }

    #[test]
    fn body_must_not_be_blank_or_too_long() {
        let blank = SendMessageRequest {
            listing_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            body: "   ".into(),
        };
        assert!(blank.validate_request().is_err());

        let long = SendMessageRequest {
            body: "a".repeat(MAX_BODY_CHARS + 1),
            ..blank.clone()
        };
        assert!(long.validate_request().is_err());

        let ok = SendMessageRequest {
            body: "Hello".into(),
            ..blank
        };
        assert!(ok.validate_request().is_ok());
    }
}
