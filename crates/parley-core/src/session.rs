//! Session manager: who is actively viewing which conversation.
//!
//! Tracks, per user, the single peer conversation currently open
//! ("focused"), and brokers the session-initiation handshake between two
//! users who have not yet exchanged presence information. Focus decides
//! whether an incoming message gets a full real-time push or only a
//! sidebar notification.
//!
//! All state here is per-process and non-persisted; it is cleared when
//! the owning connection unregisters.

use dashmap::DashMap;

use parley_types::error::SessionError;
use parley_types::event::ServerEvent;
use parley_types::identity::UserId;

use crate::directory::UserDirectory;
use crate::presence::PresenceRegistry;

/// Result of a session-initiation handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The target was reachable and received `session_established`.
    PeerNotified,
    /// The target is offline; the conversation will surface on their
    /// sidebar as unread once a message is sent.
    PeerOffline,
}

/// Per-user record of which peer conversation is currently open.
#[derive(Debug, Default)]
pub struct SessionManager {
    focus: DashMap<UserId, UserId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `peer_id` as the conversation `user_id` currently has open.
    ///
    /// Called whenever a user explicitly opens or selects a conversation,
    /// including as a reaction to a `session_established` push. A user
    /// has at most one focused peer; this replaces any previous focus.
    pub fn open_focus(&self, user_id: UserId, peer_id: UserId) {
        tracing::debug!(user_id = %user_id, peer_id = %peer_id, "focus opened");
        self.focus.insert(user_id, peer_id);
    }

    /// The peer `user_id` currently has open, if any.
    pub fn focus_of(&self, user_id: &UserId) -> Option<UserId> {
        self.focus.get(user_id).map(|entry| entry.clone())
    }

    /// Whether `user_id` currently has `peer_id`'s conversation open.
    pub fn is_focused_on(&self, user_id: &UserId, peer_id: &UserId) -> bool {
        self.focus
            .get(user_id)
            .is_some_and(|entry| entry.value() == peer_id)
    }

    /// Forget `user_id`'s focus. Called on disconnect.
    pub fn clear_focus(&self, user_id: &UserId) {
        self.focus.remove(user_id);
    }

    /// Drop all focus records (process shutdown / test reset).
    pub fn clear(&self) {
        self.focus.clear();
    }

    /// Start a conversation from `initiator` toward `target`.
    ///
    /// Rejects self-initiation and unknown targets. On success the
    /// initiator's focus is set to the target, and if the target is
    /// currently reachable it receives a `session_established` push and
    /// is expected to open focus back and pull history. An unreachable
    /// target is not an error: the initiator proceeds and delivery
    /// degrades to an unread conversation the target discovers later.
    pub async fn initiate_session<D: UserDirectory>(
        &self,
        presence: &PresenceRegistry,
        directory: &D,
        initiator: &UserId,
        target: &UserId,
    ) -> Result<SessionOutcome, SessionError> {
        if initiator == target {
            return Err(SessionError::SelfSession);
        }
        if !directory.exists(target).await? {
            return Err(SessionError::UnknownTarget(target.to_string()));
        }

        self.open_focus(initiator.clone(), target.clone());

        let notified = presence.push_to(
            target,
            ServerEvent::SessionEstablished {
                peer_id: initiator.clone(),
                initiated_by: initiator.clone(),
            },
        );

        if notified {
            tracing::debug!(initiator = %initiator, target = %target, "session established");
            Ok(SessionOutcome::PeerNotified)
        } else {
            tracing::debug!(initiator = %initiator, target = %target, "session target offline");
            Ok(SessionOutcome::PeerOffline)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_types::error::RepositoryError;
    use std::collections::HashSet;
    use tokio::sync::mpsc::unbounded_channel;

    use crate::presence::ConnectionHandle;

    struct FixedDirectory {
        known: HashSet<UserId>,
    }

    impl FixedDirectory {
        fn with(users: &[&str]) -> Self {
            Self {
                known: users.iter().map(|u| UserId::new(*u).unwrap()).collect(),
            }
        }
    }

    impl UserDirectory for FixedDirectory {
        async fn exists(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
            Ok(self.known.contains(user_id))
        }
    }

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[test]
    fn focus_set_replace_clear() {
        let sessions = SessionManager::new();
        sessions.open_focus(user("alice"), user("bob"));
        assert!(sessions.is_focused_on(&user("alice"), &user("bob")));

        sessions.open_focus(user("alice"), user("carol"));
        assert!(!sessions.is_focused_on(&user("alice"), &user("bob")));
        assert_eq!(sessions.focus_of(&user("alice")), Some(user("carol")));

        sessions.clear_focus(&user("alice"));
        assert_eq!(sessions.focus_of(&user("alice")), None);
    }

    #[tokio::test]
    async fn initiation_rejects_self() {
        let sessions = SessionManager::new();
        let presence = PresenceRegistry::new();
        let directory = FixedDirectory::with(&["alice"]);

        let result = sessions
            .initiate_session(&presence, &directory, &user("alice"), &user("alice"))
            .await;
        assert!(matches!(result, Err(SessionError::SelfSession)));
        assert_eq!(sessions.focus_of(&user("alice")), None);
    }

    #[tokio::test]
    async fn initiation_rejects_unknown_target() {
        let sessions = SessionManager::new();
        let presence = PresenceRegistry::new();
        let directory = FixedDirectory::with(&["alice"]);

        let result = sessions
            .initiate_session(&presence, &directory, &user("alice"), &user("ghost"))
            .await;
        assert!(matches!(result, Err(SessionError::UnknownTarget(_))));
        assert_eq!(sessions.focus_of(&user("alice")), None);
    }

    #[tokio::test]
    async fn initiation_notifies_reachable_target() {
        let sessions = SessionManager::new();
        let presence = PresenceRegistry::new();
        let directory = FixedDirectory::with(&["alice", "bob"]);

        let (tx, mut rx) = unbounded_channel();
        presence.register(user("bob"), ConnectionHandle::new(tx));

        let outcome = sessions
            .initiate_session(&presence, &directory, &user("alice"), &user("bob"))
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::PeerNotified);
        assert_eq!(sessions.focus_of(&user("alice")), Some(user("bob")));

        match rx.recv().await.unwrap() {
            ServerEvent::SessionEstablished {
                peer_id,
                initiated_by,
            } => {
                assert_eq!(peer_id, user("alice"));
                assert_eq!(initiated_by, user("alice"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn initiation_proceeds_when_target_offline() {
        let sessions = SessionManager::new();
        let presence = PresenceRegistry::new();
        let directory = FixedDirectory::with(&["alice", "bob"]);

        let outcome = sessions
            .initiate_session(&presence, &directory, &user("alice"), &user("bob"))
            .await
            .unwrap();
        assert_eq!(outcome, SessionOutcome::PeerOffline);
        // Initiator's focus is set regardless.
        assert_eq!(sessions.focus_of(&user("alice")), Some(user("bob")));
    }
}
