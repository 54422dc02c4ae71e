//! Conversation aggregator: the per-user sidebar projection.
//!
//! Serves the recency-ordered list of conversation summaries and clears
//! unread counters when a conversation is opened. All writes to the
//! summaries themselves happen inside the message router's persist step;
//! this service only reads, plus the one explicit `mark_seen` mutation.

use parley_types::chat::ConversationSummary;
use parley_types::error::ChatError;
use parley_types::identity::UserId;

use crate::chat::repository::ChatRepository;

pub struct ConversationAggregator<R: ChatRepository> {
    repo: R,
}

impl<R: ChatRepository> ConversationAggregator<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// All of `user_id`'s conversation summaries, most recent first
    /// (ties broken by peer id ascending for determinism).
    pub async fn list_conversations(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        Ok(self.repo.list_conversations(user_id).await?)
    }

    /// Reset the unread counter on `(user, peer)`.
    ///
    /// Invoked when a user opens a conversation. Distinct from the
    /// sender-side auto-reset in routing, which only concerns outgoing
    /// messages.
    pub async fn mark_seen(&self, user_id: &UserId, peer_id: &UserId) -> Result<(), ChatError> {
        self.repo.mark_seen(user_id, peer_id).await?;
        tracing::debug!(user_id = %user_id, peer_id = %peer_id, "conversation marked seen");
        Ok(())
    }
}
