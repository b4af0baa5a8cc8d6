use crate::connection::ConnectionId;

/// Hub-level failures.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Connection {0} is already registered")]
    AlreadyRegistered(ConnectionId),
    #[error("Failed to encode message: {0}")]
    Encode(String),
}

/// Why a frame could not be queued for one recipient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("outbound queue is full")]
    Full,
    #[error("connection is closed")]
    Closed,
}
