//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the WebSocket
//! handlers. Services are generic over the repository traits, but
//! AppState pins them to the concrete SQLite implementations.

use std::sync::Arc;

use parley_core::chat::{ConversationAggregator, HistoryService, MessageRouter};
use parley_core::presence::PresenceRegistry;
use parley_core::session::SessionManager;
use parley_infra::sqlite::chat::SqliteChatRepository;
use parley_infra::sqlite::directory::SqliteUserDirectory;
use parley_infra::sqlite::pool::{default_database_url, DatabasePool};

/// Concrete type aliases for the service generics pinned to the SQLite
/// implementations. The repository is shared across all three services.
pub type ConcreteMessageRouter = MessageRouter<Arc<SqliteChatRepository>>;
pub type ConcreteConversationAggregator = ConversationAggregator<Arc<SqliteChatRepository>>;
pub type ConcreteHistoryService = HistoryService<Arc<SqliteChatRepository>>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ConcreteMessageRouter>,
    pub aggregator: Arc<ConcreteConversationAggregator>,
    pub history: Arc<ConcreteHistoryService>,
    pub presence: Arc<PresenceRegistry>,
    pub sessions: Arc<SessionManager>,
    pub directory: Arc<SqliteUserDirectory>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, wire
    /// services. With no explicit URL the default location is used and
    /// its parent directory created if missing.
    pub async fn init(database_url: Option<String>) -> anyhow::Result<Self> {
        let db_url = match database_url {
            Some(url) => url,
            None => {
                let url = default_database_url();
                if let Some(path) = url.strip_prefix("sqlite://") {
                    if let Some(parent) = std::path::Path::new(path).parent() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                url
            }
        };
        let db_pool = DatabasePool::new(&db_url).await?;

        // One repository instance shared by router, aggregator, and history.
        let chat_repo = Arc::new(SqliteChatRepository::new(db_pool.clone()));
        let directory = Arc::new(SqliteUserDirectory::new(db_pool.clone()));

        let presence = Arc::new(PresenceRegistry::new());
        let sessions = Arc::new(SessionManager::new());

        let router = MessageRouter::new(
            Arc::clone(&chat_repo),
            Arc::clone(&presence),
            Arc::clone(&sessions),
        );
        let aggregator = ConversationAggregator::new(Arc::clone(&chat_repo));
        let history = HistoryService::new(Arc::clone(&chat_repo));

        Ok(Self {
            router: Arc::new(router),
            aggregator: Arc::new(aggregator),
            history: Arc::new(history),
            presence,
            sessions,
            directory,
            db_pool,
        })
    }
}
