//! Connection hub for the tickerchat relay.
//!
//! The hub owns the set of live connections and fans messages out to them.
//! Two kinds of producers feed it:
//!
//! - [`Session`]: one per client connection; decodes inbound frames, hands
//!   chat messages to the [`ChatStore`] in the background, and relays them.
//! - [`QuotePoller`]: a single background task that fetches a fixed roster of
//!   symbols every period and broadcasts each quote.
//!
//! Producers never talk to each other directly; they only go through
//! [`Hub::broadcast`], which encodes a message once, copies a snapshot of the
//! registry, and pushes the frame to each connection's bounded outbound queue
//! without holding the registry lock.

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod poller;
pub mod registry;
pub mod session;

use std::sync::Arc;
use tickerchat_core::ChatStore;
use tracing::info;

pub use broadcast::BroadcastReport;
pub use config::{HubConfig, PollerConfig, RelayMode};
pub use connection::{Connection, ConnectionId, Frame, Liveness, Outbox};
pub use error::{HubError, SendError};
pub use poller::{PollerHandle, QuotePoller, TickReport};
pub use registry::Registry;
pub use session::{FrameOutcome, Session, SessionState};

/// The registry plus the broadcast engine.
pub struct Hub {
    registry: Registry,
    store: Arc<dyn ChatStore>,
    config: HubConfig,
}

impl Hub {
    pub fn new(config: HubConfig, store: Arc<dyn ChatStore>) -> Self {
        Self {
            registry: Registry::new(),
            store,
            config,
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    /// Create a connection and register it.
    pub async fn connect(&self) -> Result<(Connection, Outbox), HubError> {
        let (conn, outbox) = Connection::new(self.config.outbound_queue);
        self.registry.register(conn.clone()).await?;
        info!(conn_id = %conn.id(), "Connection registered");
        Ok((conn, outbox))
    }

    /// Unregister a connection. No-op if it is already gone.
    pub async fn disconnect(&self, id: ConnectionId) {
        if self.registry.unregister(id).await.is_some() {
            info!(conn_id = %id, "Connection unregistered");
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
