//! Connection handles.
//!
//! A [`Connection`] is the hub's view of one client: an id, a liveness state,
//! and the sending half of a bounded queue of pre-encoded frames. The
//! transport drains the other half ([`Outbox`]) and writes to the socket.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

use crate::error::SendError;

/// One encoded outbound message, shared by every recipient of a broadcast.
pub type Frame = Arc<str>;

/// Receiving half of a connection's outbound queue.
pub type Outbox = mpsc::Receiver<Frame>;

/// Unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0.simple())
    }
}

/// Liveness of a connection. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Liveness {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

impl Liveness {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug)]
struct Inner {
    id: ConnectionId,
    state: AtomicU8,
    sender: mpsc::Sender<Frame>,
    state_changed: Notify,
}

/// Cheap-clone handle to a live connection.
#[derive(Debug, Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Create a connection with an outbound queue of `queue_size` frames.
    pub fn new(queue_size: usize) -> (Self, Outbox) {
        let (sender, outbox) = mpsc::channel(queue_size.max(1));
        let conn = Self {
            inner: Arc::new(Inner {
                id: ConnectionId::generate(),
                state: AtomicU8::new(Liveness::Open as u8),
                sender,
                state_changed: Notify::new(),
            }),
        };
        (conn, outbox)
    }

    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    pub fn state(&self) -> Liveness {
        Liveness::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == Liveness::Open
    }

    /// Queue a frame without waiting.
    pub fn try_send(&self, frame: Frame) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::Closed);
        }
        self.inner.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    /// Stop accepting frames. The transport is expected to wind down.
    pub fn mark_closing(&self) {
        self.advance(Liveness::Closing);
    }

    pub(crate) fn mark_closed(&self) {
        self.advance(Liveness::Closed);
    }

    /// Resolves once the connection is no longer open.
    pub async fn closed(&self) {
        loop {
            let notified = self.inner.state_changed.notified();
            if !self.is_open() {
                return;
            }
            notified.await;
        }
    }

    fn advance(&self, to: Liveness) {
        let previous = self.inner.state.fetch_max(to as u8, Ordering::AcqRel);
        if previous < to as u8 {
            self.inner.state_changed.notify_waiters();
        }
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Connection {}
