use std::sync::Arc;
use tickerchat_auth::JwtAuth;
use tickerchat_core::{ChatStore, UserStore};
use tickerchat_data::SyntheticQuoteSource;
use tickerchat_hub::Hub;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub hub: Arc<Hub>,
    pub users: Arc<dyn UserStore>,
    /// Chat history, read by `/api/chat/recent`. The hub writes to the same store.
    pub chats: Arc<dyn ChatStore>,
    pub auth: JwtAuth,
    /// Backs `/api/stock/{symbol}`. Always in-process so a poller pointed at
    /// this server never fetches from itself in a loop.
    pub quotes: SyntheticQuoteSource,
    /// Require a valid token to open a WebSocket.
    pub require_ws_auth: bool,
}

impl AppState {
    pub fn new(
        hub: Arc<Hub>,
        users: Arc<dyn UserStore>,
        chats: Arc<dyn ChatStore>,
        auth: JwtAuth,
    ) -> Self {
        Self {
            hub,
            users,
            chats,
            auth,
            quotes: SyntheticQuoteSource::new(),
            require_ws_auth: false,
        }
    }

    pub fn with_ws_auth(mut self, required: bool) -> Self {
        self.require_ws_auth = required;
        self
    }
}
