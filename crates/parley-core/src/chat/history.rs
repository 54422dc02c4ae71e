//! History service: the ordered transcript between two users.

use parley_types::chat::Message;
use parley_types::error::ChatError;
use parley_types::identity::UserId;

use crate::chat::repository::ChatRepository;

/// Serves message-history queries. Pure read; no state mutation.
pub struct HistoryService<R: ChatRepository> {
    repo: R,
}

impl<R: ChatRepository> HistoryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// The full transcript between `user_id` and `peer_id` (the
    /// unordered pair), ordered by `sent_at` ascending. Unbounded;
    /// callers needing pagination wrap this.
    pub async fn history(
        &self,
        user_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, ChatError> {
        Ok(self.repo.history(user_id, peer_id).await?)
    }
}
