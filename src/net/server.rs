//! WebSocket server accepting voice connections

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::{delete, get},
    Router,
};
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::channel::{Outbound, WsChannel};
use super::connection::{ConnectionHandler, DeviceSelection, Inbound};
use super::handlers;
use crate::constants::DEFAULT_WS_PATH;
use crate::relay::VoiceRelay;

/// Shared state of the server
pub struct AppState {
    pub relay: Arc<VoiceRelay>,
    pub devices: DeviceSelection,
    pub started_at: Instant,
    connections: AtomicU64,
}

impl AppState {
    pub fn new(relay: Arc<VoiceRelay>, devices: DeviceSelection) -> Self {
        Self {
            relay,
            devices,
            started_at: Instant::now(),
            connections: AtomicU64::new(0),
        }
    }
}

pub struct WebServer {
    state: Arc<AppState>,
}

impl WebServer {
    pub fn new(relay: Arc<VoiceRelay>, devices: DeviceSelection) -> Self {
        Self {
            state: Arc::new(AppState::new(relay, devices)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(DEFAULT_WS_PATH, get(ws_handler))
            .route("/api/status", get(handlers::get_status))
            .route("/api/sessions", get(handlers::get_sessions))
            .route("/api/sessions/:id", delete(handlers::end_session))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind to the configured address and serve until the task is dropped
    pub async fn run(self) -> std::io::Result<()> {
        let server = &self.state.relay.config().server;
        let addr = format!("{}:{}", server.bind_address, server.port);
        let listener = TcpListener::bind(&addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        tracing::info!("Listening on ws://{}{}", listener.local_addr()?, DEFAULT_WS_PATH);
        axum::serve(listener, self.router()).await
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let peer = format!("conn-{}", state.connections.fetch_add(1, Ordering::Relaxed) + 1);
    tracing::info!(peer = %peer, "WebSocket connection accepted");

    let (mut sink, mut stream) = socket.split();
    let (channel, mut rx) = WsChannel::new(state.relay.config().network.outbound_capacity);

    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let message = match outbound {
                Outbound::Binary(data) => Message::Binary(data.to_vec()),
                Outbound::Text(text) => Message::Text(text),
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            };
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    let mut handler = ConnectionHandler::new(state.relay.clone(), channel.clone(), state.devices.clone(), peer.clone());

    while let Some(message) = stream.next().await {
        let inbound = match message {
            Ok(Message::Binary(data)) => Inbound::Binary(Bytes::from(data)),
            Ok(Message::Text(text)) => Inbound::Text(text),
            Ok(Message::Close(_)) => Inbound::Close,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(peer = %peer, "WebSocket read error: {}", e);
                break;
            }
        };
        if !handler.handle(inbound).await {
            break;
        }
    }

    channel.mark_closed();
    handler.shutdown().await;
    drop(channel);
    let _ = writer.await;
    tracing::info!(peer = %peer, "WebSocket connection finished");
}

#[cfg(all(test, feature = "client"))]
mod tests {
    use super::*;
    use crate::audio::mock::MockBackend;
    use crate::config::RelayConfig;
    use crate::error::SessionError;
    use crate::net::client::VoiceClient;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    async fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        for _ in 0..500 {
            if condition() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_client_server_call() {
        let server_backend = MockBackend::new();
        let server_relay = Arc::new(VoiceRelay::new(Arc::new(server_backend.clone()), RelayConfig::default()));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = WebServer::new(server_relay.clone(), DeviceSelection::default());
        let server_task = tokio::spawn(server.serve(listener));

        let client_backend = MockBackend::new();
        let client_relay = Arc::new(VoiceRelay::new(Arc::new(client_backend.clone()), RelayConfig::default()));
        let client = VoiceClient::new(client_relay.clone(), DeviceSelection::default());

        let delivered = Arc::new(AtomicBool::new(false));
        let hangup = {
            let server_relay = server_relay.clone();
            let client_backend = client_backend.clone();
            let delivered = delivered.clone();
            async move {
                if !wait_for(|| server_relay.session_count() == 1).await {
                    return;
                }
                let block: Vec<f32> = (0..320).map(|i| (i as f32 * 0.09).sin() * 0.5).collect();
                client_backend.tick_capture(&block);

                let arrived = wait_for(|| {
                    server_relay
                        .sessions()
                        .first()
                        .map(|s| s.stats.frames_received == 1)
                        .unwrap_or(false)
                })
                .await;
                delivered.store(arrived, Ordering::SeqCst);
            }
        };

        let url = format!("ws://{}{}", addr, DEFAULT_WS_PATH);
        tokio::time::timeout(Duration::from_secs(10), client.run(&url, hangup))
            .await
            .expect("client finished in time")
            .expect("client ran cleanly");

        assert!(delivered.load(Ordering::SeqCst), "captured frame reached the server queue");
        assert!(wait_for(|| server_backend.closed() == 2).await);
        assert_eq!(server_relay.session_count(), 0);
        assert_eq!(client_relay.session_count(), 0);
        assert_eq!(client_backend.opened(), 2);
        assert_eq!(client_backend.closed(), 2);

        server_task.abort();
    }
    #[tokio::test]
    async fn test_refused_call_releases_client_devices() {
        let mut server_config = RelayConfig::default();
        server_config.audio.block_ms = 40.0;
        let server_backend = MockBackend::new();
        let server_relay = Arc::new(VoiceRelay::new(Arc::new(server_backend.clone()), server_config));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = WebServer::new(server_relay.clone(), DeviceSelection::default());
        let server_task = tokio::spawn(server.serve(listener));

        let client_backend = MockBackend::new();
        let client_relay = Arc::new(VoiceRelay::new(Arc::new(client_backend.clone()), RelayConfig::default()));
        let client = VoiceClient::new(client_relay.clone(), DeviceSelection::default());

        let url = format!("ws://{}{}", addr, DEFAULT_WS_PATH);
        let result = tokio::time::timeout(Duration::from_secs(10), client.run(&url, std::future::pending()))
            .await
            .expect("client gave up on the refused call");

        assert!(matches!(result, Err(crate::Error::Session(SessionError::Refused(_)))));
        assert_eq!(client_relay.session_count(), 0);
        assert_eq!(client_backend.closed(), 2);
        assert_eq!(server_backend.opened(), 0);

        server_task.abort();
    }
}
