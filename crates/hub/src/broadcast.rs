//! Fan-out of one message to every registered connection.

use tickerchat_core::OutboundEnvelope;
use tracing::{debug, warn};

use crate::connection::{ConnectionId, Frame};
use crate::error::HubError;
use crate::Hub;

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// Connections dropped because the frame could not be queued.
    pub dropped: usize,
}

impl Hub {
    /// Encode `message` once and queue it for every open connection except
    /// `exclude`.
    ///
    /// A recipient whose queue is full or whose transport is gone is marked
    /// closing and unregistered; the rest of the batch is unaffected.
    pub async fn broadcast(
        &self,
        message: &OutboundEnvelope,
        exclude: Option<ConnectionId>,
    ) -> Result<BroadcastReport, HubError> {
        let frame: Frame = message
            .encode()
            .map_err(|e| HubError::Encode(e.to_string()))?
            .into();
        let report = self.broadcast_frame(frame, exclude).await;
        debug!(
            kind = message.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast message"
        );
        Ok(report)
    }

    /// Queue an already-encoded frame. See [`Hub::broadcast`].
    pub async fn broadcast_frame(
        &self,
        frame: Frame,
        exclude: Option<ConnectionId>,
    ) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut failed = Vec::new();

        self.registry()
            .for_each(|conn| {
                if Some(conn.id()) == exclude {
                    return;
                }
                match conn.try_send(frame.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(e) => {
                        warn!(conn_id = %conn.id(), error = %e, "Dropping connection after failed send");
                        conn.mark_closing();
                        failed.push(conn.id());
                    }
                }
            })
            .await;

        for id in failed {
            self.disconnect(id).await;
            report.dropped += 1;
        }
        report
    }
}
