//! Message routing, conversation aggregation, and history reads.

pub mod aggregator;
pub mod history;
pub mod repository;
pub mod router;

pub use aggregator::ConversationAggregator;
pub use history::HistoryService;
pub use repository::ChatRepository;
pub use router::MessageRouter;
