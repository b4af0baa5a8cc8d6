//! End-to-end relay tests: a real server on an ephemeral port, driven by
//! WebSocket clients.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tickerchat_api::{build_router, serve, AppState};
use tickerchat_auth::JwtAuth;
use tickerchat_core::{Identity, OutboundEnvelope};
use tickerchat_data::{MemoryChatStore, MemoryUserStore, SyntheticQuoteSource};
use tickerchat_hub::{Hub, HubConfig, PollerConfig, QuotePoller, RelayMode};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "relay-test-secret";
const HI: &str = r#"{"type":"chat","payload":{"from":"alice","text":"hi"}}"#;

struct TestServer {
    addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    async fn start(relay_mode: RelayMode, require_ws_auth: bool) -> Self {
        let chats = Arc::new(MemoryChatStore::new());
        let hub = Arc::new(Hub::new(
            HubConfig {
                relay_mode,
                ..Default::default()
            },
            chats.clone(),
        ));
        let state = AppState::new(
            Arc::clone(&hub),
            Arc::new(MemoryUserStore::new()),
            chats,
            JwtAuth::new(SECRET),
        )
        .with_ws_auth(require_ws_auth);
        let app = build_router(Arc::new(state), None).unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();
        tokio::spawn(serve(listener, app, async move {
            let _ = rx.await;
        }));

        Self {
            addr,
            hub,
            shutdown: Some(tx),
        }
    }

    fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    async fn connect(&self, path: &str) -> Client {
        let before = self.hub.connection_count().await;
        let (client, _) = connect_async(self.ws_url(path)).await.unwrap();
        self.wait_for_connections(before + 1).await;
        client
    }

    async fn wait_for_connections(&self, n: usize) {
        for _ in 0..100 {
            if self.hub.connection_count().await == n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} connections", n);
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = msg {
            return text.to_string();
        }
    }
}

async fn assert_silent(client: &mut Client) {
    let res = tokio::time::timeout(Duration::from_millis(200), client.next()).await;
    assert!(res.is_err(), "unexpected frame: {:?}", res);
}

#[tokio::test]
async fn test_echo_mode_reaches_sender_and_peers() {
    let server = TestServer::start(RelayMode::Echo, false).await;
    let mut alice = server.connect("/ws").await;
    let mut bob = server.connect("/ws/chat").await;

    alice.send(Message::Text(HI.into())).await.unwrap();

    let to_bob = next_text(&mut bob).await;
    let to_alice = next_text(&mut alice).await;
    assert_eq!(to_bob, to_alice);
    let value: serde_json::Value = serde_json::from_str(&to_bob).unwrap();
    assert_eq!(value["type"], "chat");
    assert_eq!(value["payload"]["from"], "alice");
    assert_eq!(value["payload"]["text"], "hi");
}

#[tokio::test]
async fn test_exclude_sender_mode() {
    let server = TestServer::start(RelayMode::ExcludeSender, false).await;
    let mut alice = server.connect("/ws").await;
    let mut bob = server.connect("/ws").await;

    alice.send(Message::Text(HI.into())).await.unwrap();

    let to_bob = next_text(&mut bob).await;
    assert!(matches!(
        OutboundEnvelope::decode(&to_bob).unwrap(),
        OutboundEnvelope::Chat(_)
    ));
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection() {
    let server = TestServer::start(RelayMode::Echo, false).await;
    let mut alice = server.connect("/ws").await;

    alice.send(Message::Text("{not json".into())).await.unwrap();
    alice
        .send(Message::Text(r#"{"payload":{}}"#.into()))
        .await
        .unwrap();
    assert_silent(&mut alice).await;
    assert_eq!(server.hub.connection_count().await, 1);

    alice.send(Message::Text(HI.into())).await.unwrap();
    assert!(next_text(&mut alice).await.contains("\"hi\""));
}

#[tokio::test]
async fn test_disconnect_unregisters() {
    let server = TestServer::start(RelayMode::Echo, false).await;
    let mut alice = server.connect("/ws").await;
    let _bob = server.connect("/ws").await;

    alice.close(None).await.unwrap();
    server.wait_for_connections(1).await;
}

#[tokio::test]
async fn test_chat_history_after_relay() {
    let server = TestServer::start(RelayMode::Echo, false).await;
    let mut alice = server.connect("/ws").await;
    alice.send(Message::Text(HI.into())).await.unwrap();
    next_text(&mut alice).await;

    let url = format!("http://{}/api/chat/recent", server.addr);
    let mut history = Vec::new();
    for _ in 0..50 {
        history = reqwest::get(&url)
            .await
            .unwrap()
            .json::<Vec<serde_json::Value>>()
            .await
            .unwrap();
        if !history.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["from_user"], "alice");
    assert_eq!(history[0]["text"], "hi");
}

#[tokio::test]
async fn test_poller_quotes_reach_clients() {
    let server = TestServer::start(RelayMode::Echo, false).await;
    let mut client = server.connect("/ws").await;

    let poller = QuotePoller::new(
        Arc::clone(&server.hub),
        Arc::new(SyntheticQuoteSource::new()),
        PollerConfig {
            symbols: vec!["AAPL".to_string(), "BTC-USD".to_string()],
            period: Duration::from_millis(50),
        },
    )
    .spawn();

    let mut symbols = Vec::new();
    for _ in 0..2 {
        match OutboundEnvelope::decode(&next_text(&mut client).await).unwrap() {
            OutboundEnvelope::Stock(quote) => {
                assert_eq!(quote.spark.len(), 20);
                symbols.push(quote.symbol);
            }
            other => panic!("expected stock frame, got {:?}", other),
        }
    }
    assert_eq!(symbols, vec!["AAPL", "BTC-USD"]);

    poller.shutdown().await;
}

#[tokio::test]
async fn test_ws_auth_gate() {
    let server = TestServer::start(RelayMode::Echo, true).await;

    match connect_async(server.ws_url("/ws")).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected 401, got {:?}", other.map(|(_, r)| r.status())),
    }
    match connect_async(server.ws_url("/ws?token=garbage")).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 401),
        other => panic!("expected 401, got {:?}", other.map(|(_, r)| r.status())),
    }
    assert_eq!(server.hub.connection_count().await, 0);

    let token = JwtAuth::new(SECRET)
        .issue_token(&Identity {
            id: 7,
            username: "alice".to_string(),
        })
        .unwrap();
    let mut alice = server.connect(&format!("/ws?token={}", token)).await;
    alice.send(Message::Text(HI.into())).await.unwrap();
    next_text(&mut alice).await;
}
