//! SQLite-backed identity-existence lookup.

use parley_core::directory::UserDirectory;
use parley_types::error::RepositoryError;
use parley_types::identity::UserId;

use super::pool::DatabasePool;

/// `UserDirectory` backed by the `users` table.
pub struct SqliteUserDirectory {
    pool: DatabasePool,
}

impl SqliteUserDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl UserDirectory for SqliteUserDirectory {
    async fn exists(&self, user_id: &UserId) -> Result<bool, RepositoryError> {
        let row: (i64,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
            .bind(user_id.as_str())
            .fetch_one(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(row.0 != 0)
    }
}
