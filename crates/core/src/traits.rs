use crate::models::*;
use async_trait::async_trait;

// ---------------------------------------------------------------------------
// Quote Source
// ---------------------------------------------------------------------------

/// Errors that can occur while fetching a quote.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Quote request failed: {0}")]
    Request(String),
    #[error("Quote source returned status {status} for {symbol}")]
    Status { symbol: String, status: u16 },
    #[error("Quote decode error: {0}")]
    Decode(String),
    #[error("Invalid quote: {0}")]
    Invalid(String),
}

/// Provides the current quote for a symbol.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch a fresh quote. May be slow; may fail.
    async fn fetch_quote(&self, symbol: &str) -> Result<QuoteRecord, SourceError>;
}

// ---------------------------------------------------------------------------
// Persistence
// ---------------------------------------------------------------------------

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(String),
}

/// Chat history storage.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Append a received chat message.
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, PersistenceError>;

    /// The latest `limit` messages, oldest first.
    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, PersistenceError>;

    /// Flag the given messages as seen. Returns how many were updated;
    /// unknown ids are skipped.
    async fn mark_seen(&self, ids: &[i64]) -> Result<u64, PersistenceError>;
}

/// Account storage.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create an account. `PersistenceError::Conflict` if the username is taken.
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, PersistenceError>;

    /// Look up an account by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, PersistenceError>;
}
