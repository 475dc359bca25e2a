//! Test fixtures shared by the integration tests.
//!
//! Each `TestServer` is one relay process bound to an ephemeral port. Servers
//! started with the same `InMemoryBroker` behave like separate processes
//! attached to one pub/sub backend.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use hiroba_server::{infrastructure::pubsub::InMemoryBroker, ui::AppState};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const CHANNEL_PREFIX: &str = "chat_";

/// How long a client waits before deciding no message is coming
pub const SILENCE: Duration = Duration::from_millis(300);

pub struct TestServer {
    addr: String,
    state: Arc<AppState>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start a server with a broker of its own
    pub async fn start() -> Self {
        Self::start_with_broker(InMemoryBroker::default()).await
    }

    /// Start a server attached to `broker`
    pub async fn start_with_broker(broker: InMemoryBroker) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener
            .local_addr()
            .expect("Failed to read local address")
            .to_string();
        let state = Arc::new(AppState::in_memory(broker, CHANNEL_PREFIX));
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn({
            let state = state.clone();
            async move {
                let shutdown = async {
                    let _ = shutdown_rx.await;
                };
                if let Err(e) = hiroba_server::ui::serve(listener, state, shutdown).await {
                    eprintln!("test server error: {e}");
                }
            }
        });

        Self {
            addr,
            state,
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn ws_url(&self, room: &str, username: &str) -> String {
        format!("ws://{}/ws/chat/{}?username={}", self.addr, room, username)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Connect a WebSocket client to `room` as `username`
    pub async fn connect(&self, room: &str, username: &str) -> WsClient {
        let (ws, _) = connect_async(self.ws_url(room, username))
            .await
            .expect("Failed to connect WebSocket");
        ws
    }

    /// Stop accepting connections and wait for the channel layer to shut down
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Send a chat message in the inbound wire format
pub async fn send_chat(ws: &mut WsClient, text: &str) {
    let payload = serde_json::json!({ "message": text }).to_string();
    ws.send(Message::text(payload))
        .await
        .expect("Failed to send message");
}

/// Receive the next text frame as JSON, failing after two seconds
pub async fn recv_json(ws: &mut WsClient) -> serde_json::Value {
    let deadline = Duration::from_secs(2);
    loop {
        let frame = tokio::time::timeout(deadline, ws.next())
            .await
            .expect("Timed out waiting for a message")
            .expect("Stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("Invalid JSON frame");
        }
    }
}

/// Assert that no text frame arrives within `SILENCE`
pub async fn assert_silent(ws: &mut WsClient) {
    match tokio::time::timeout(SILENCE, ws.next()).await {
        Err(_) => {}
        Ok(Some(Ok(Message::Text(text)))) => panic!("Unexpected message: {text}"),
        Ok(_) => {}
    }
}

/// Poll the room detail endpoint until it answers with `status`
pub async fn wait_for_room_status(server: &TestServer, room: &str, status: u16) -> bool {
    let client = reqwest::Client::new();
    for _ in 0..40 {
        let response = client
            .get(format!("{}/api/rooms/{}", server.base_url(), room))
            .send()
            .await
            .expect("Failed to send request");
        if response.status().as_u16() == status {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
