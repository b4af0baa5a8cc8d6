//! Per-connection inbound message handling.

use chrono::Utc;
use serde_json::{Map, Value};
use std::sync::Arc;
use tickerchat_core::{ChatPayload, InboundEnvelope, NewChatMessage, MARK_SEEN_TYPE};
use tracing::{debug, error, warn};

use crate::broadcast::BroadcastReport;
use crate::config::RelayMode;
use crate::connection::{Connection, ConnectionId, Outbox};
use crate::error::HubError;
use crate::Hub;

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connected,
    Closed,
}

/// What happened to one inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Decoded and broadcast.
    Relayed(BroadcastReport),
    /// Malformed; ignored. The session stays connected.
    Dropped,
    /// The session is no longer connected.
    Closed,
}

/// The hub side of one client connection.
///
/// Opening a session registers a connection; [`Session::close`] unregisters
/// it. Between the two, every text frame from the client goes through
/// [`Session::handle_frame`].
#[derive(Debug)]
pub struct Session {
    hub: Arc<Hub>,
    conn: Connection,
    state: SessionState,
}

impl Session {
    /// Register a new connection and return its session and outbox.
    pub async fn open(hub: Arc<Hub>) -> Result<(Self, Outbox), HubError> {
        let (conn, outbox) = hub.connect().await?;
        let session = Self {
            hub,
            conn,
            state: SessionState::Connected,
        };
        Ok((session, outbox))
    }

    pub fn id(&self) -> ConnectionId {
        self.conn.id()
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn state(&self) -> SessionState {
        if self.state == SessionState::Connected && !self.conn.is_open() {
            return SessionState::Closed;
        }
        self.state
    }

    /// Decode one text frame and relay it.
    ///
    /// Chat messages are also written to history, and `mark_seen` frames flag
    /// their `payload.ids` as seen. Both writes run in detached tasks that
    /// never delay or cancel the broadcast; failures are only logged.
    pub async fn handle_frame(&self, text: &str) -> FrameOutcome {
        if self.state() == SessionState::Closed {
            return FrameOutcome::Closed;
        }

        let envelope = match InboundEnvelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(conn_id = %self.id(), error = %e, "Dropping malformed frame");
                return FrameOutcome::Dropped;
            }
        };

        match &envelope {
            InboundEnvelope::Chat(chat) => self.persist(chat),
            InboundEnvelope::Other { kind, payload } if kind == MARK_SEEN_TYPE => {
                self.mark_seen(payload)
            }
            InboundEnvelope::Other { .. } => {}
        }

        let exclude = match self.hub.config().relay_mode {
            RelayMode::Echo => None,
            RelayMode::ExcludeSender => Some(self.id()),
        };

        match self.hub.broadcast(&envelope.into(), exclude).await {
            Ok(report) => FrameOutcome::Relayed(report),
            Err(e) => {
                error!(conn_id = %self.id(), error = %e, "Failed to relay frame");
                FrameOutcome::Dropped
            }
        }
    }

    /// Resolves when the hub has dropped this connection.
    pub async fn closed(&self) {
        self.conn.closed().await
    }

    /// Leave the hub. Idempotent.
    pub async fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.hub.disconnect(self.id()).await;
    }

    fn persist(&self, chat: &ChatPayload) {
        let store = Arc::clone(self.hub.store());
        let message = NewChatMessage::received(chat, Utc::now());
        let conn_id = self.id();
        tokio::spawn(async move {
            match store.append(message).await {
                Ok(saved) => debug!(%conn_id, message_id = saved.id, "Chat message stored"),
                Err(e) => warn!(%conn_id, error = %e, "Failed to store chat message"),
            }
        });
    }

    fn mark_seen(&self, payload: &Map<String, Value>) {
        let ids = seen_ids(payload);
        if ids.is_empty() {
            debug!(conn_id = %self.id(), "mark_seen without ids");
            return;
        }
        let store = Arc::clone(self.hub.store());
        let conn_id = self.id();
        tokio::spawn(async move {
            match store.mark_seen(&ids).await {
                Ok(updated) => debug!(%conn_id, updated, "Chat messages marked seen"),
                Err(e) => warn!(%conn_id, error = %e, "Failed to mark chat messages seen"),
            }
        });
    }
}

/// Integer ids from `payload.ids`; anything else in the list is ignored.
fn seen_ids(payload: &Map<String, Value>) -> Vec<i64> {
    payload
        .get("ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}
