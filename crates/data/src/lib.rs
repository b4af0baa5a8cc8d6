pub mod db;
pub mod memory;
pub mod quotes;

use async_trait::async_trait;
use tickerchat_core::{ChatMessage, ChatStore, NewChatMessage, PersistenceError, User, UserStore};

pub use memory::{MemoryChatStore, MemoryUserStore};
pub use quotes::{HttpQuoteSource, SyntheticQuoteSource};

/// A PostgreSQL-backed chat history store.
#[derive(Clone)]
pub struct PostgresChatStore {
    pub pool: sqlx::PgPool,
}

impl PostgresChatStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ChatStore for PostgresChatStore {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, PersistenceError> {
        db::insert_chat_message(&self.pool, &message)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, PersistenceError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        db::recent_chat_messages(&self.pool, limit)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))
    }

    async fn mark_seen(&self, ids: &[i64]) -> Result<u64, PersistenceError> {
        if ids.is_empty() {
            return Ok(0);
        }
        db::mark_chat_messages_seen(&self.pool, ids)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))
    }
}

/// A PostgreSQL-backed account store.
#[derive(Clone)]
pub struct PostgresUserStore {
    pub pool: sqlx::PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, PersistenceError> {
        db::insert_user(&self.pool, username, password_hash)
            .await
            .map_err(|e| {
                if db::is_unique_violation(&e) {
                    PersistenceError::Conflict(format!("user {} already exists", username))
                } else {
                    PersistenceError::Database(e.to_string())
                }
            })
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, PersistenceError> {
        db::find_user_by_username(&self.pool, username)
            .await
            .map_err(|e| PersistenceError::Database(e.to_string()))
    }
}
