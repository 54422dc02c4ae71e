//! UserDirectory trait definition.
//!
//! The identity-existence check consumed from the (external) auth
//! collaborator: account creation and credentials live elsewhere, the
//! messaging core only asks "is this a known identity" before letting a
//! session be initiated with it.

use parley_types::error::RepositoryError;
use parley_types::identity::UserId;

/// Read-only lookup into the account store.
///
/// Implementations live in parley-infra (e.g. `SqliteUserDirectory`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait UserDirectory: Send + Sync {
    /// Whether `user_id` names an existing account.
    fn exists(
        &self,
        user_id: &UserId,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
