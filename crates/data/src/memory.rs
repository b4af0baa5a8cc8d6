//! In-process stores used when no database is configured, and in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use tickerchat_core::{ChatMessage, ChatStore, NewChatMessage, PersistenceError, User, UserStore};
use tokio::sync::RwLock;

/// Chat history kept in memory.
#[derive(Debug, Default)]
pub struct MemoryChatStore {
    messages: RwLock<Vec<ChatMessage>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, PersistenceError> {
        let mut messages = self.messages.write().await;
        let stored = ChatMessage {
            id: messages.len() as i64 + 1,
            from_user: message.from_user,
            text: message.text,
            time: message.time,
            created_at: message.created_at,
            delivered: message.delivered,
            seen: message.seen,
        };
        messages.push(stored.clone());
        Ok(stored)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, PersistenceError> {
        let messages = self.messages.read().await;
        let start = messages.len().saturating_sub(limit);
        Ok(messages[start..].to_vec())
    }

    async fn mark_seen(&self, ids: &[i64]) -> Result<u64, PersistenceError> {
        let mut messages = self.messages.write().await;
        let mut updated = 0;
        for message in messages.iter_mut().filter(|m| ids.contains(&m.id)) {
            message.seen = true;
            updated += 1;
        }
        Ok(updated)
    }
}

/// Accounts kept in memory, keyed by username.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<User, PersistenceError> {
        let mut users = self.users.write().await;
        if users.contains_key(username) {
            return Err(PersistenceError::Conflict(format!(
                "user {} already exists",
                username
            )));
        }
        let user = User {
            id: users.len() as i64 + 1,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
        };
        users.insert(username.to_string(), user.clone());
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, PersistenceError> {
        Ok(self.users.read().await.get(username).cloned())
    }
}
