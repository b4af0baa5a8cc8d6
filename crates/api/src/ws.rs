//! WebSocket transport for hub sessions.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tickerchat_core::Identity;
use tickerchat_hub::Session;
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    pub token: Option<String>,
}

/// Upgrade handler. Rejects the upgrade before anything is registered when
/// the token gate is on and no valid token was presented.
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user = if state.require_ws_auth {
        let token = query
            .token
            .as_deref()
            .or_else(|| bearer.as_ref().map(|TypedHeader(auth)| auth.token()));
        let Some(token) = token else {
            return Err(ApiError::Unauthorized("No token provided".to_string()));
        };
        let identity = state.auth.verify_token(token).map_err(|e| {
            debug!(error = %e, "Rejected WebSocket token");
            ApiError::Unauthorized("Invalid token".to_string())
        })?;
        Some(identity)
    } else {
        None
    };

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user: Option<Identity>) {
    let (mut session, mut outbox) = match Session::open(Arc::clone(&state.hub)).await {
        Ok(opened) => opened,
        Err(e) => {
            error!(error = %e, "Failed to register WebSocket connection");
            return;
        }
    };
    let conn_id = session.id();
    info!(
        %conn_id,
        user = user.as_ref().map_or("anonymous", |u| u.username.as_str()),
        "WebSocket connected"
    );

    let (mut sink, mut stream) = socket.split();

    // Drain the outbox onto the socket until the hub drops us or the write fails.
    let conn = session.connection().clone();
    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = outbox.recv() => frame,
                _ = conn.closed() => None,
            };
            let Some(frame) = frame else { break };
            if let Err(e) = sink.send(Message::Text(String::from(&*frame).into())).await {
                debug!(%conn_id, error = %e, "WebSocket write failed");
                break;
            }
        }
        conn.mark_closing();
        let _ = sink.close().await;
    });

    loop {
        let next = tokio::select! {
            next = stream.next() => next,
            _ = session.closed() => {
                debug!(%conn_id, "Hub dropped connection");
                break;
            }
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                session.handle_frame(text.as_str()).await;
            }
            Some(Ok(Message::Binary(_))) => {
                debug!(%conn_id, "Ignoring binary frame");
            }
            Some(Ok(Message::Close(_))) | None => break,
            // Pings are answered by axum.
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
            Some(Err(e)) => {
                warn!(%conn_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }

    session.close().await;
    if let Err(e) = writer.await {
        warn!(%conn_id, error = %e, "WebSocket writer ended abnormally");
    }
    info!(%conn_id, "WebSocket disconnected");
}
