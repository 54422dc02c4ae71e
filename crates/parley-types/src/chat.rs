//! Message and conversation summary types for Parley.
//!
//! A `Message` is the immutable record of one direct message; a
//! `ConversationSummary` is the denormalized per-directed-pair row that
//! powers the sidebar conversation list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::UserId;

/// An immutable direct message between two users.
///
/// `sent_at` is assigned by the persistence layer at write time from the
/// server clock -- never client-supplied -- so history queries have a
/// stable total order. Message ids are UUIDv7 (time-sortable), which
/// doubles as the secondary sort key when two messages share a timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

/// Denormalized conversation state for one user's view of one peer.
///
/// Stored directionally: a send from A to B updates the row for
/// `(B, A)` (unread incremented) and independently the row for `(A, B)`
/// (unread reset -- the sender has seen their own outgoing message).
/// Rows are created lazily on the first message between a pair and never
/// deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub user_id: UserId,
    pub peer_id: UserId,
    pub last_message: String,
    pub last_message_at: DateTime<Utc>,
    pub unread_count: u32,
}
