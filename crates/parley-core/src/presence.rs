//! Presence registry: which users are currently reachable, and how.
//!
//! Maps a user identity to its current live connection. A user has at
//! most one live connection; a later registration for the same identity
//! supersedes the earlier one, which then receives no further routed
//! traffic even if the transport keeps it open. The registry is an
//! explicitly constructed, explicitly owned object passed to whoever
//! routes traffic -- no ambient global maps.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use parley_types::event::ServerEvent;
use parley_types::identity::UserId;

/// Channel end through which the server pushes events to one connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// A live transport endpoint bound to one registered user.
///
/// The id distinguishes this connection from any later connection the
/// same user opens, so a stale disconnect cannot evict a newer
/// registration.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    sender: EventSender,
}

impl ConnectionHandle {
    pub fn new(sender: EventSender) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Push an event to this connection.
    ///
    /// Returns false if the connection's receiver is gone (the actor has
    /// shut down); such pushes are dropped silently, never raised to the
    /// sender.
    pub fn push(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// In-memory map from user identity to live connection.
///
/// Pure process-scoped state; nothing here is persisted. Reads and
/// writes are safe under dashmap's per-shard locking since
/// registrations are independent across identities.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    connections: DashMap<UserId, ConnectionHandle>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a user to a connection, replacing any prior mapping.
    ///
    /// Idempotent: re-registering the same handle is a no-op in effect.
    pub fn register(&self, user_id: UserId, handle: ConnectionHandle) {
        if let Some(previous) = self.connections.insert(user_id.clone(), handle) {
            tracing::debug!(
                user_id = %user_id,
                superseded = %previous.id(),
                "registration superseded an earlier connection"
            );
        } else {
            tracing::debug!(user_id = %user_id, "user registered");
        }
    }

    /// Current connection for a user, if reachable.
    pub fn lookup(&self, user_id: &UserId) -> Option<ConnectionHandle> {
        self.connections.get(user_id).map(|entry| entry.clone())
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.connections.contains_key(user_id)
    }

    /// Remove the mapping for `user_id`, but only if it still points at
    /// `connection_id`. Returns whether an entry was removed.
    ///
    /// Called on transport close. The guard prevents a stale disconnect
    /// from evicting a newer registration for the same identity.
    pub fn unregister(&self, user_id: &UserId, connection_id: Uuid) -> bool {
        let removed = self
            .connections
            .remove_if(user_id, |_, handle| handle.id() == connection_id)
            .is_some();
        if removed {
            tracing::debug!(user_id = %user_id, "user unregistered");
        }
        removed
    }

    /// Push an event to a user's current connection, if any.
    ///
    /// Absent or stale targets are a silent no-op; returns whether the
    /// event was handed to a live channel.
    pub fn push_to(&self, user_id: &UserId, event: ServerEvent) -> bool {
        match self.lookup(user_id) {
            Some(handle) => handle.push(event),
            None => false,
        }
    }

    /// Number of currently registered users.
    pub fn online_count(&self) -> usize {
        self.connections.len()
    }

    /// Drop all registrations (process shutdown / test reset).
    pub fn clear(&self) {
        self.connections.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn handle() -> (ConnectionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = unbounded_channel();
        (ConnectionHandle::new(tx), rx)
    }

    fn user(raw: &str) -> UserId {
        UserId::new(raw).unwrap()
    }

    #[test]
    fn register_and_lookup() {
        let registry = PresenceRegistry::new();
        let (conn, _rx) = handle();
        registry.register(user("alice"), conn.clone());

        let found = registry.lookup(&user("alice")).unwrap();
        assert_eq!(found.id(), conn.id());
        assert!(registry.is_online(&user("alice")));
        assert!(!registry.is_online(&user("bob")));
    }

    #[test]
    fn re_registration_supersedes() {
        let registry = PresenceRegistry::new();
        let (conn1, _rx1) = handle();
        let (conn2, _rx2) = handle();

        registry.register(user("alice"), conn1.clone());
        registry.register(user("alice"), conn2.clone());

        assert_eq!(registry.lookup(&user("alice")).unwrap().id(), conn2.id());

        // A late disconnect of the superseded connection must not evict
        // the newer registration.
        assert!(!registry.unregister(&user("alice"), conn1.id()));
        assert_eq!(registry.lookup(&user("alice")).unwrap().id(), conn2.id());

        assert!(registry.unregister(&user("alice"), conn2.id()));
        assert!(registry.lookup(&user("alice")).is_none());
    }

    #[test]
    fn push_to_absent_user_is_silent() {
        let registry = PresenceRegistry::new();
        assert!(!registry.push_to(&user("ghost"), ServerEvent::Pong));
    }

    #[test]
    fn push_to_stale_connection_is_silent() {
        let registry = PresenceRegistry::new();
        let (conn, rx) = handle();
        registry.register(user("alice"), conn);
        drop(rx);
        assert!(!registry.push_to(&user("alice"), ServerEvent::Pong));
    }

    #[tokio::test]
    async fn push_delivers_to_live_connection() {
        let registry = PresenceRegistry::new();
        let (conn, mut rx) = handle();
        registry.register(user("alice"), conn);

        assert!(registry.push_to(&user("alice"), ServerEvent::Pong));
        assert!(matches!(rx.recv().await, Some(ServerEvent::Pong)));
    }

    #[test]
    fn clear_empties_the_registry() {
        let registry = PresenceRegistry::new();
        let (conn, _rx) = handle();
        registry.register(user("alice"), conn);
        assert_eq!(registry.online_count(), 1);
        registry.clear();
        assert_eq!(registry.online_count(), 0);
    }
}
