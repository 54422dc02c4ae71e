//! Server-to-client wire events.
//!
//! `ServerEvent` is the unified event type pushed to a client connection.
//! All variants are Clone + Send + Sync for use with tokio mpsc channels;
//! the transport serializes them as internally-tagged JSON text frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::{ConversationSummary, Message};
use crate::identity::UserId;

/// Events pushed from the server to a single client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Acknowledges a successful `register` command.
    Registered { user_id: UserId },

    /// A peer wants to start a conversation with this user.
    ///
    /// The receiving client is expected to open focus on `peer_id` and
    /// pull history.
    SessionEstablished {
        peer_id: UserId,
        initiated_by: UserId,
    },

    /// Lightweight sidebar update: a new message arrived from `from`.
    ///
    /// Always pushed to a reachable recipient, whether or not the
    /// conversation is currently open.
    SidebarNotify { from: UserId, message: String },

    /// Full real-time message push, delivered only when the recipient
    /// currently has the sender's conversation open.
    MessagePushed {
        from: UserId,
        message: String,
        sent_at: DateTime<Utc>,
    },

    /// Echo of the sender's own outgoing message back to their connection.
    SendConfirmed {
        to: UserId,
        message: String,
        sent_at: DateTime<Utc>,
    },

    /// Response to `list_conversations`: summaries ordered by recency.
    Conversations {
        conversations: Vec<ConversationSummary>,
    },

    /// Response to `get_history`: the full transcript with one peer.
    History {
        peer_id: UserId,
        messages: Vec<Message>,
    },

    /// A request failed; reported only to the originating connection.
    Error { code: String, message: String },

    /// Keep-alive response.
    Pong,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_tag_as_snake_case() {
        let event = ServerEvent::SidebarNotify {
            from: UserId::new("alice").unwrap(),
            message: "hi".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"sidebar_notify\""));
    }

    #[test]
    fn error_event_round_trip() {
        let event = ServerEvent::Error {
            code: "INVALID_REQUEST".to_string(),
            message: "cannot send a message to yourself".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ServerEvent::Error { code, .. } if code == "INVALID_REQUEST"));
    }

    #[test]
    fn message_pushed_carries_timestamp() {
        let event = ServerEvent::MessagePushed {
            from: UserId::new("bob").unwrap(),
            message: "hello".to_string(),
            sent_at: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("sent_at"));
    }
}
