use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::connection::{Connection, ConnectionId};
use crate::error::HubError;

/// The set of live connections.
///
/// One lock guards the map. It is held only to mutate or to copy a snapshot;
/// callers iterate the snapshot, so sends never happen under the lock.
#[derive(Debug, Default)]
pub struct Registry {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection. Fails if its id is already present.
    pub async fn register(&self, conn: Connection) -> Result<(), HubError> {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&conn.id()) {
            return Err(HubError::AlreadyRegistered(conn.id()));
        }
        connections.insert(conn.id(), conn);
        Ok(())
    }

    /// Remove a connection and mark it closed. Safe to call repeatedly.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Connection> {
        let removed = self.connections.write().await.remove(&id);
        if let Some(conn) = &removed {
            conn.mark_closed();
        }
        removed
    }

    /// Point-in-time copy of the current members.
    pub async fn snapshot(&self) -> Vec<Connection> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Visit every member of a snapshot that is still open when reached.
    pub async fn for_each(&self, mut visit: impl FnMut(&Connection)) {
        for conn in self.snapshot().await {
            if conn.is_open() {
                visit(&conn);
            }
        }
    }

    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Liveness;

    #[tokio::test]
    async fn test_register_and_unregister() {
        let registry = Registry::new();
        let (conn, _rx) = Connection::new(4);

        registry.register(conn.clone()).await.unwrap();
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(conn.id()).await);

        let removed = registry.unregister(conn.id()).await;
        assert!(removed.is_some());
        assert_eq!(conn.state(), Liveness::Closed);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_double_register_rejected() {
        let registry = Registry::new();
        let (conn, _rx) = Connection::new(4);

        registry.register(conn.clone()).await.unwrap();
        let err = registry.register(conn.clone()).await.unwrap_err();
        assert!(matches!(err, HubError::AlreadyRegistered(id) if id == conn.id()));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = Registry::new();
        let (conn, _rx) = Connection::new(4);
        registry.register(conn.clone()).await.unwrap();

        assert!(registry.unregister(conn.id()).await.is_some());
        assert!(registry.unregister(conn.id()).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_for_each_skips_members_closed_mid_iteration() {
        let registry = Registry::new();
        let mut held = Vec::new();
        for _ in 0..3 {
            let (conn, rx) = Connection::new(4);
            registry.register(conn.clone()).await.unwrap();
            held.push((conn, rx));
        }

        // Whichever member is visited first closes one of the others.
        let mut visited = Vec::new();
        let mut victim = None;
        registry
            .for_each(|conn| {
                visited.push(conn.id());
                if victim.is_none() {
                    let other = held
                        .iter()
                        .map(|(c, _)| c)
                        .find(|c| c.id() != conn.id())
                        .cloned();
                    if let Some(other) = other {
                        other.mark_closing();
                        victim = Some(other.id());
                    }
                }
            })
            .await;

        let victim = victim.unwrap();
        assert_eq!(visited.len(), 2);
        assert!(!visited.contains(&victim));
    }
}
