//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `parley-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, writes on the
//! single-connection writer pool, reads on the reader pool.

use chrono::{DateTime, SecondsFormat, Utc};
use parley_core::chat::repository::ChatRepository;
use parley_types::chat::{ConversationSummary, Message};
use parley_types::error::RepositoryError;
use parley_types::identity::UserId;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain Message.
struct MessageRow {
    id: String,
    sender_id: String,
    receiver_id: String,
    message_text: String,
    sent_at: String,
}

impl MessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            sender_id: row.try_get("sender_id")?,
            receiver_id: row.try_get("receiver_id")?,
            message_text: row.try_get("message_text")?,
            sent_at: row.try_get("sent_at")?,
        })
    }

    fn into_message(self) -> Result<Message, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid message id: {e}")))?;
        let sender_id = UserId::new(self.sender_id)
            .map_err(|e| RepositoryError::Query(format!("invalid sender_id: {e}")))?;
        let receiver_id = UserId::new(self.receiver_id)
            .map_err(|e| RepositoryError::Query(format!("invalid receiver_id: {e}")))?;
        let sent_at = parse_datetime(&self.sent_at)?;

        Ok(Message {
            id,
            sender_id,
            receiver_id,
            text: self.message_text,
            sent_at,
        })
    }
}

/// Internal row type for mapping SQLite rows to domain ConversationSummary.
struct ConversationRow {
    user_id: String,
    peer_id: String,
    last_message: String,
    last_message_at: String,
    unread_count: i64,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            user_id: row.try_get("user_id")?,
            peer_id: row.try_get("peer_id")?,
            last_message: row.try_get("last_message")?,
            last_message_at: row.try_get("last_message_at")?,
            unread_count: row.try_get("unread_count")?,
        })
    }

    fn into_summary(self) -> Result<ConversationSummary, RepositoryError> {
        let user_id = UserId::new(self.user_id)
            .map_err(|e| RepositoryError::Query(format!("invalid user_id: {e}")))?;
        let peer_id = UserId::new(self.peer_id)
            .map_err(|e| RepositoryError::Query(format!("invalid peer_id: {e}")))?;
        let last_message_at = parse_datetime(&self.last_message_at)?;

        Ok(ConversationSummary {
            user_id,
            peer_id,
            last_message: self.last_message,
            last_message_at,
            unread_count: self.unread_count as u32,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width microsecond precision so the TEXT column sorts
/// chronologically under ORDER BY.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn persist_send(
        &self,
        from: &UserId,
        to: &UserId,
        text: &str,
    ) -> Result<Message, RepositoryError> {
        let message = Message {
            id: Uuid::now_v7(),
            sender_id: from.clone(),
            receiver_id: to.clone(),
            text: text.to_string(),
            sent_at: Utc::now(),
        };
        let sent_at = format_datetime(&message.sent_at);

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO messages (id, sender_id, receiver_id, message_text, sent_at)
               VALUES (?, ?, ?, ?, ?)"#,
        )
        .bind(message.id.to_string())
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(&message.text)
        .bind(&sent_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Receiver's row: increment inside SQL so concurrent sends
        // cannot lose counts to a read-modify-write race.
        sqlx::query(
            r#"INSERT INTO conversations (user_id, peer_id, last_message, last_message_at, unread_count)
               VALUES (?, ?, ?, ?, 1)
               ON CONFLICT (user_id, peer_id) DO UPDATE SET
                   last_message = excluded.last_message,
                   last_message_at = excluded.last_message_at,
                   unread_count = conversations.unread_count + 1"#,
        )
        .bind(to.as_str())
        .bind(from.as_str())
        .bind(&message.text)
        .bind(&sent_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        // Sender's row: sending implies having seen the conversation.
        sqlx::query(
            r#"INSERT INTO conversations (user_id, peer_id, last_message, last_message_at, unread_count)
               VALUES (?, ?, ?, ?, 0)
               ON CONFLICT (user_id, peer_id) DO UPDATE SET
                   last_message = excluded.last_message,
                   last_message_at = excluded.last_message_at,
                   unread_count = 0"#,
        )
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(&message.text)
        .bind(&sent_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(message)
    }

    async fn mark_seen(&self, user_id: &UserId, peer_id: &UserId) -> Result<(), RepositoryError> {
        // No row means no unread messages; nothing to clear.
        sqlx::query(
            "UPDATE conversations SET unread_count = 0 WHERE user_id = ? AND peer_id = ?",
        )
        .bind(user_id.as_str())
        .bind(peer_id.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_conversations(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ConversationSummary>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT user_id, peer_id, last_message, last_message_at, unread_count
               FROM conversations
               WHERE user_id = ?
               ORDER BY last_message_at DESC, peer_id ASC"#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut summaries = Vec::with_capacity(rows.len());
        for row in &rows {
            let conv_row = ConversationRow::from_row(row)
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            summaries.push(conv_row.into_summary()?);
        }

        Ok(summaries)
    }

    async fn history(
        &self,
        user_id: &UserId,
        peer_id: &UserId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT id, sender_id, receiver_id, message_text, sent_at
               FROM messages
               WHERE (sender_id = ? AND receiver_id = ?) OR (sender_id = ? AND receiver_id = ?)
               ORDER BY sent_at ASC, id ASC"#,
        )
        .bind(user_id.as_str())
        .bind(peer_id.as_str())
        .bind(peer_id.as_str())
        .bind(user_id.as_str())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                MessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::DatabasePool;
    use std::sync::Arc;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        // Leak tempdir so it lives for the test
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn create_user(pool: &DatabasePool, id: &str) -> UserId {
        sqlx::query("INSERT INTO users (id) VALUES (?)")
            .bind(id)
            .execute(&pool.writer)
            .await
            .unwrap();
        UserId::new(id).unwrap()
    }

    async fn summary_for(
        repo: &SqliteChatRepository,
        user: &UserId,
        peer: &UserId,
    ) -> Option<ConversationSummary> {
        repo.list_conversations(user)
            .await
            .unwrap()
            .into_iter()
            .find(|s| &s.peer_id == peer)
    }

    #[tokio::test]
    async fn test_persist_send_writes_message_and_both_rows() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        let message = repo.persist_send(&alice, &bob, "hi bob").await.unwrap();
        assert_eq!(message.sender_id, alice);
        assert_eq!(message.receiver_id, bob);
        assert_eq!(message.text, "hi bob");

        let transcript = repo.history(&alice, &bob).await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].id, message.id);

        let bob_row = summary_for(&repo, &bob, &alice).await.unwrap();
        assert_eq!(bob_row.unread_count, 1);
        assert_eq!(bob_row.last_message, "hi bob");

        let alice_row = summary_for(&repo, &alice, &bob).await.unwrap();
        assert_eq!(alice_row.unread_count, 0);
        assert_eq!(alice_row.last_message, "hi bob");
    }

    #[tokio::test]
    async fn test_unread_accumulates_and_reply_resets() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        repo.persist_send(&alice, &bob, "one").await.unwrap();
        repo.persist_send(&alice, &bob, "two").await.unwrap();

        let bob_row = summary_for(&repo, &bob, &alice).await.unwrap();
        assert_eq!(bob_row.unread_count, 2);
        assert_eq!(bob_row.last_message, "two");

        // Replying clears the replier's own unread counter.
        repo.persist_send(&bob, &alice, "back at you").await.unwrap();

        let bob_row = summary_for(&repo, &bob, &alice).await.unwrap();
        assert_eq!(bob_row.unread_count, 0);

        let alice_row = summary_for(&repo, &alice, &bob).await.unwrap();
        assert_eq!(alice_row.unread_count, 1);
        assert_eq!(alice_row.last_message, "back at you");
    }

    #[tokio::test]
    async fn test_mark_seen_resets_counter() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        repo.persist_send(&alice, &bob, "unread").await.unwrap();
        assert_eq!(summary_for(&repo, &bob, &alice).await.unwrap().unread_count, 1);

        repo.mark_seen(&bob, &alice).await.unwrap();
        assert_eq!(summary_for(&repo, &bob, &alice).await.unwrap().unread_count, 0);

        // Missing row is fine.
        let carol = create_user(&pool, "carol").await;
        repo.mark_seen(&carol, &alice).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_conversations_ordering() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let carol = create_user(&pool, "carol").await;

        repo.persist_send(&bob, &alice, "from bob").await.unwrap();
        repo.persist_send(&carol, &alice, "from carol").await.unwrap();

        let list = repo.list_conversations(&alice).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].peer_id, carol, "most recent conversation first");
        assert_eq!(list[1].peer_id, bob);

        // New activity moves bob back to the top.
        repo.persist_send(&bob, &alice, "again").await.unwrap();
        let list = repo.list_conversations(&alice).await.unwrap();
        assert_eq!(list[0].peer_id, bob);
    }

    #[tokio::test]
    async fn test_list_conversations_tie_breaks_on_peer_id() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        create_user(&pool, "zed").await;
        create_user(&pool, "bob").await;

        // Insert rows directly with identical timestamps to force the tie.
        let ts = format_datetime(&Utc::now());
        for peer in ["zed", "bob"] {
            sqlx::query(
                "INSERT INTO conversations (user_id, peer_id, last_message, last_message_at, unread_count) VALUES (?, ?, ?, ?, 0)",
            )
            .bind(alice.as_str())
            .bind(peer)
            .bind("tied")
            .bind(&ts)
            .execute(&pool.writer)
            .await
            .unwrap();
        }

        let list = repo.list_conversations(&alice).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].peer_id.as_str(), "bob");
        assert_eq!(list[1].peer_id.as_str(), "zed");
    }

    #[tokio::test]
    async fn test_history_covers_both_directions_in_order() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let carol = create_user(&pool, "carol").await;

        repo.persist_send(&alice, &bob, "first").await.unwrap();
        repo.persist_send(&bob, &alice, "second").await.unwrap();
        repo.persist_send(&alice, &bob, "third").await.unwrap();
        // Unrelated pair must not leak into the transcript.
        repo.persist_send(&alice, &carol, "other").await.unwrap();

        let transcript = repo.history(&alice, &bob).await.unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].text, "first");
        assert_eq!(transcript[1].text, "second");
        assert_eq!(transcript[2].text, "third");
        assert!(transcript.windows(2).all(|w| w[0].sent_at <= w[1].sent_at));

        // Same transcript regardless of argument order.
        let reversed = repo.history(&bob, &alice).await.unwrap();
        assert_eq!(reversed, transcript);
    }

    #[tokio::test]
    async fn test_persist_send_rejects_unknown_user() {
        let pool = test_pool().await;
        let repo = SqliteChatRepository::new(pool.clone());
        let alice = create_user(&pool, "alice").await;
        let ghost = UserId::new("ghost").unwrap();

        let err = repo.persist_send(&alice, &ghost, "hello?").await;
        assert!(err.is_err(), "FK violation should surface as an error");

        // The failed transaction must leave no partial state.
        assert!(repo.history(&alice, &ghost).await.unwrap().is_empty());
        assert!(repo.list_conversations(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sends_do_not_lose_increments() {
        let pool = test_pool().await;
        let repo = Arc::new(SqliteChatRepository::new(pool.clone()));
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        let mut handles = Vec::new();
        for i in 0..8 {
            let repo = Arc::clone(&repo);
            let alice = alice.clone();
            let bob = bob.clone();
            handles.push(tokio::spawn(async move {
                repo.persist_send(&alice, &bob, &format!("msg {i}")).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let bob_row = summary_for(&repo, &bob, &alice).await.unwrap();
        assert_eq!(bob_row.unread_count, 8);
        assert_eq!(repo.history(&alice, &bob).await.unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_concurrent_distinct_senders() {
        let pool = test_pool().await;
        let repo = Arc::new(SqliteChatRepository::new(pool.clone()));
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;
        let carol = create_user(&pool, "carol").await;

        let mut handles = Vec::new();
        for sender in [bob.clone(), carol.clone()] {
            let repo = Arc::clone(&repo);
            let alice = alice.clone();
            handles.push(tokio::spawn(async move {
                repo.persist_send(&sender, &alice, "ping").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(summary_for(&repo, &alice, &bob).await.unwrap().unread_count, 1);
        assert_eq!(summary_for(&repo, &alice, &carol).await.unwrap().unread_count, 1);
    }
}
