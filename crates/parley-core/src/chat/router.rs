//! Message router: validate, persist, and fan out one send.
//!
//! The router is the only writer of conversation summaries. It consults
//! the presence registry and session manager to decide which live
//! connections get a real-time push, persists through the
//! `ChatRepository`, and only emits pushes after the storage transaction
//! has committed, so a failed send has no observable side effects.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parley_types::chat::Message;
use parley_types::error::{ChatError, RepositoryError};
use parley_types::event::ServerEvent;
use parley_types::identity::UserId;

use crate::chat::repository::ChatRepository;
use crate::presence::PresenceRegistry;
use crate::session::SessionManager;

/// Default bound on a single persistence call.
const DEFAULT_STORAGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Accepts send requests and routes delivery.
///
/// Generic over `ChatRepository` to maintain clean architecture
/// (parley-core never depends on parley-infra).
pub struct MessageRouter<R: ChatRepository> {
    repo: R,
    presence: Arc<PresenceRegistry>,
    sessions: Arc<SessionManager>,
    storage_timeout: Duration,
}

impl<R: ChatRepository> MessageRouter<R> {
    pub fn new(repo: R, presence: Arc<PresenceRegistry>, sessions: Arc<SessionManager>) -> Self {
        Self {
            repo,
            presence,
            sessions,
            storage_timeout: DEFAULT_STORAGE_TIMEOUT,
        }
    }

    /// Override the persistence timeout (mainly for tests).
    pub fn with_storage_timeout(mut self, timeout: Duration) -> Self {
        self.storage_timeout = timeout;
        self
    }

    /// Route one message from `from` to `to`.
    ///
    /// Rejections (empty text, self-send) happen before any side effect.
    /// Persistence covers the message insert and both summary upserts in
    /// one transaction; a failure or timeout aborts the whole send as a
    /// retryable transient-storage error before any push is emitted.
    ///
    /// Delivery after commit:
    /// - recipient reachable: `sidebar_notify`, always;
    /// - recipient focused on the sender: additionally `message_pushed`;
    /// - sender reachable: `send_confirmed` echo.
    pub async fn send(&self, from: &UserId, to: &UserId, text: &str) -> Result<Message, ChatError> {
        if text.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if from == to {
            return Err(ChatError::SelfMessage);
        }

        let message = self
            .bounded(self.repo.persist_send(from, to, text))
            .await?;

        if let Some(handle) = self.presence.lookup(to) {
            handle.push(ServerEvent::SidebarNotify {
                from: from.clone(),
                message: message.text.clone(),
            });
            if self.sessions.is_focused_on(to, from) {
                handle.push(ServerEvent::MessagePushed {
                    from: from.clone(),
                    message: message.text.clone(),
                    sent_at: message.sent_at,
                });
            }
        }

        self.presence.push_to(
            from,
            ServerEvent::SendConfirmed {
                to: to.clone(),
                message: message.text.clone(),
                sent_at: message.sent_at,
            },
        );

        tracing::debug!(
            from = %from,
            to = %to,
            message_id = %message.id,
            "message routed"
        );

        Ok(message)
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, RepositoryError>>,
    ) -> Result<T, ChatError> {
        match tokio::time::timeout(self.storage_timeout, call).await {
            Ok(result) => result.map_err(ChatError::from),
            Err(_) => {
                tracing::warn!("persistence call exceeded {:?}", self.storage_timeout);
                Err(ChatError::Storage(RepositoryError::Timeout))
            }
        }
    }
}
