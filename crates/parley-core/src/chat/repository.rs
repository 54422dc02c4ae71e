//! ChatRepository trait definition.
//!
//! The abstract persistence interface for messages and conversation
//! summaries. Implementations live in parley-infra (e.g.
//! `SqliteChatRepository`). Uses native async fn in traits (RPITIT,
//! Rust 2024 edition).

use parley_types::chat::{ConversationSummary, Message};
use parley_types::error::RepositoryError;
use parley_types::identity::UserId;

/// Persistence for messages and per-directed-pair conversation summaries.
///
/// The store assigns `sent_at` from its own clock at write time and must
/// provide a monotonically non-decreasing timestamp source.
pub trait ChatRepository: Send + Sync {
    /// Persist one send as a single transaction: insert the message,
    /// upsert the receiver's summary row `(to, from)` with
    /// `unread_count + 1`, and upsert the sender's row `(from, to)` with
    /// `unread_count = 0`. Either all three writes commit or none do.
    ///
    /// The returned record carries the authoritative `sent_at`.
    fn persist_send(
        &self,
        from: &UserId,
        to: &UserId,
        text: &str,
    ) -> impl std::future::Future<Output = Result<Message, RepositoryError>> + Send;

    /// Reset `unread_count` to 0 on the `(user, peer)` summary row.
    ///
    /// A missing row is not an error; there is simply nothing to clear.
    fn mark_seen(
        &self,
        user_id: &UserId,
        peer_id: &UserId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All summary rows for `user_id`, ordered by `last_message_at`
    /// descending, ties broken by `peer_id` ascending.
    fn list_conversations(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationSummary>, RepositoryError>> + Send;

    /// The full transcript between the unordered pair `{user, peer}`,
    /// ordered by `sent_at` ascending (message id as stable tiebreak).
    fn history(
        &self,
        user_id: &UserId,
        peer_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, RepositoryError>> + Send;
}

// One repository instance is shared by the router, aggregator, and
// history service, so Arc<R> must be usable wherever R is.
impl<R: ChatRepository> ChatRepository for std::sync::Arc<R> {
    async fn persist_send(
        &self,
        from: &UserId,
        to: &UserId,
        text: &str,
    ) -> Result<Message, RepositoryError> {
        (**self).persist_send(from, to, text).await
    }

    async fn mark_seen(&self, user_id: &UserId, peer_id: &UserId) -> Result<(), RepositoryError> {
        (**self).mark_seen(user_id, peer_id).await
    }

    async fn list_conversations(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        (**self).list_conversations(user_id).await
    }

    async fn history(
        &self,
        user_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, RepositoryError> {
        (**self).history(user_id, peer_id).await
    }
}
