//! Per-connection message handling shared by server and client
//!
//! The socket reader converts transport messages into [`Inbound`] and feeds
//! them to a [`ConnectionHandler`], which starts and stops the voice session
//! and routes binary frames to it.
//!
//! Opening and closing devices joins stream threads, so both run on the
//! blocking pool rather than on the socket task.

use bytes::Bytes;
use std::sync::Arc;

use super::channel::{DuplexChannel, WsChannel};
use crate::audio::buffer::Frame;
use crate::config::AudioConfig;
use crate::error::{AudioError, SessionError};
use crate::protocol::ControlMessage;
use crate::relay::{SessionId, VoiceRelay};

/// Message read from the socket
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Binary(Bytes),
    Text(String),
    Close,
}

/// Local devices a connection's session uses
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelection {
    pub playback: String,
    pub capture: String,
}

impl DeviceSelection {
    pub fn from_config(audio: &AudioConfig) -> Self {
        Self {
            playback: audio.playback_device.clone(),
            capture: audio.capture_device.clone(),
        }
    }
}

pub struct ConnectionHandler {
    relay: Arc<VoiceRelay>,
    channel: Arc<WsChannel>,
    devices: DeviceSelection,
    session: Option<SessionId>,
    refusal: Option<String>,
    peer: String,
}

impl ConnectionHandler {
    pub fn new(
        relay: Arc<VoiceRelay>,
        channel: Arc<WsChannel>,
        devices: DeviceSelection,
        peer: impl Into<String>,
    ) -> Self {
        Self {
            relay,
            channel,
            devices,
            session: None,
            refusal: None,
            peer: peer.into(),
        }
    }

    /// The session of this connection, if it is still registered
    pub fn session(&mut self) -> Option<SessionId> {
        if let Some(id) = self.session {
            // Ended from outside, e.g. through the HTTP API.
            if self.relay.session(id).is_none() {
                tracing::debug!(peer = %self.peer, session = %id, "Session ended elsewhere");
                self.session = None;
            }
        }
        self.session
    }

    /// Reason the peer gave for refusing our `voice_start`, once
    pub fn take_refusal(&mut self) -> Option<String> {
        self.refusal.take()
    }

    /// Start the local side of the call for this connection
    pub async fn start_session(&mut self) -> Result<SessionId, SessionError> {
        if self.session().is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let relay = self.relay.clone();
        let channel: Arc<dyn DuplexChannel> = self.channel.clone();
        let devices = self.devices.clone();

        let id = tokio::task::spawn_blocking(move || {
            relay.start_session(channel, &devices.playback, &devices.capture)
        })
        .await
        .map_err(|e| SessionError::Audio(AudioError::StreamError(e.to_string())))??;

        self.session = Some(id);
        Ok(id)
    }

    /// End the local side of the call, keeping the connection
    pub async fn stop_session(&mut self) -> bool {
        let Some(id) = self.session.take() else {
            return false;
        };

        let relay = self.relay.clone();
        tokio::task::spawn_blocking(move || relay.end_session(id))
            .await
            .unwrap_or(false)
    }

    /// Handle one inbound message; returns false once the connection is done
    pub async fn handle(&mut self, message: Inbound) -> bool {
        match message {
            Inbound::Binary(data) => {
                match self.session() {
                    Some(id) => {
                        if !self.relay.deliver(id, Frame::from(data)) {
                            tracing::trace!(peer = %self.peer, "Frame for inactive session dropped");
                        }
                    }
                    None => tracing::trace!(peer = %self.peer, "Binary message without a session dropped"),
                }
                true
            }
            Inbound::Text(text) => {
                self.handle_text(text).await;
                true
            }
            Inbound::Close => {
                tracing::info!(peer = %self.peer, "Connection closed by peer");
                false
            }
        }
    }

    async fn handle_text(&mut self, text: String) {
        let message = match ControlMessage::parse(&text) {
            Ok(message) => message,
            Err(_) => {
                tracing::info!(peer = %self.peer, "Text message: {}", text);
                return;
            }
        };

        match message {
            ControlMessage::VoiceStart { .. } => {
                let reply = match message.check_compatible(&self.relay.config().audio) {
                    Err(reason) => ControlMessage::VoiceError { message: reason },
                    Ok(()) => match self.start_session().await {
                        Ok(id) => ControlMessage::VoiceReady {
                            session_id: id.to_string(),
                        },
                        Err(e) => ControlMessage::VoiceError { message: e.to_string() },
                    },
                };
                if let ControlMessage::VoiceError { message } = &reply {
                    tracing::warn!(peer = %self.peer, "Refused voice_start: {}", message);
                }
                let _ = self.channel.send_text(reply.to_json()).await;
            }
            ControlMessage::VoiceReady { session_id } => {
                tracing::info!(peer = %self.peer, "Peer voice session {} ready", session_id);
            }
            ControlMessage::VoiceError { message } => {
                tracing::warn!(peer = %self.peer, "Peer could not start voice: {}", message);
                self.stop_session().await;
                self.refusal = Some(message);
            }
            ControlMessage::VoiceStop => {
                if self.stop_session().await {
                    tracing::info!(peer = %self.peer, "Voice stopped by peer");
                }
            }
            ControlMessage::Text { body } => {
                tracing::info!(peer = %self.peer, "Text message: {}", body);
            }
        }
    }

    /// Teardown after the socket is done: end the session and close the channel
    pub async fn shutdown(mut self) {
        self.stop_session().await;
        self.channel.close();
    }
}

impl Drop for ConnectionHandler {
    fn drop(&mut self) {
        if let Some(id) = self.session.take() {
            self.relay.end_session(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::mock::MockBackend;
    use crate::config::RelayConfig;
    use crate::net::channel::Outbound;
    use tokio::sync::mpsc;

    fn setup() -> (ConnectionHandler, mpsc::Receiver<Outbound>, Arc<VoiceRelay>, MockBackend) {
        let backend = MockBackend::new();
        let relay = Arc::new(VoiceRelay::new(Arc::new(backend.clone()), RelayConfig::default()));
        let (channel, rx) = WsChannel::new(16);
        let handler = ConnectionHandler::new(relay.clone(), channel, DeviceSelection::default(), "test");
        (handler, rx, relay, backend)
    }

    async fn reply(rx: &mut mpsc::Receiver<Outbound>) -> ControlMessage {
        match rx.recv().await {
            Some(Outbound::Text(text)) => ControlMessage::parse(&text).unwrap(),
            other => panic!("expected a text reply, got {:?}", other),
        }
    }

    fn voice_start() -> Inbound {
        Inbound::Text(ControlMessage::voice_start(&AudioConfig::default()).to_json())
    }

    fn text(message: ControlMessage) -> Inbound {
        Inbound::Text(message.to_json())
    }

    #[tokio::test]
    async fn test_voice_start_opens_session_and_acks() {
        let (mut handler, mut rx, relay, backend) = setup();

        assert!(handler.handle(voice_start()).await);
        let id = handler.session().expect("session started");
        assert_eq!(
            reply(&mut rx).await,
            ControlMessage::VoiceReady {
                session_id: id.to_string()
            }
        );

        assert!(handler.handle(Inbound::Binary(Bytes::from_static(&[1, 2, 3, 4]))).await);
        assert_eq!(relay.session(id).unwrap().queue_len(), 1);

        assert!(!handler.handle(Inbound::Close).await);
        handler.shutdown().await;
        assert_eq!(relay.session_count(), 0);
        assert_eq!(backend.closed(), 2);
        assert_eq!(rx.recv().await, Some(Outbound::Close));
    }

    #[tokio::test]
    async fn test_second_voice_start_refused() {
        let (mut handler, mut rx, relay, _backend) = setup();
        handler.handle(voice_start()).await;
        let _ = reply(&mut rx).await;

        handler.handle(voice_start()).await;
        assert!(matches!(reply(&mut rx).await, ControlMessage::VoiceError { .. }));
        assert_eq!(relay.session_count(), 1);
    }

    #[tokio::test]
    async fn test_incompatible_format_refused() {
        let (mut handler, mut rx, relay, backend) = setup();
        let mut audio = AudioConfig::default();
        audio.block_ms = 2.5;

        handler
            .handle(Inbound::Text(ControlMessage::voice_start(&audio).to_json()))
            .await;
        assert!(matches!(reply(&mut rx).await, ControlMessage::VoiceError { .. }));
        assert_eq!(relay.session_count(), 0);
        assert_eq!(backend.opened(), 0);
    }

    #[tokio::test]
    async fn test_voice_stop_keeps_connection() {
        let (mut handler, mut rx, relay, backend) = setup();
        handler.handle(voice_start()).await;
        let _ = reply(&mut rx).await;

        assert!(handler.handle(text(ControlMessage::VoiceStop)).await);
        assert!(handler.session().is_none());
        assert_eq!(relay.session_count(), 0);
        assert_eq!(backend.closed(), 2);
    }

    #[tokio::test]
    async fn test_hang_up_from_outside_notifies_peer_and_allows_restart() {
        let (mut handler, mut rx, relay, backend) = setup();
        handler.handle(voice_start()).await;
        let id = handler.session().unwrap();
        let _ = reply(&mut rx).await;

        assert!(relay.hang_up(id));
        assert_eq!(reply(&mut rx).await, ControlMessage::VoiceStop);
        assert_eq!(backend.closed(), 2);

        // Frames still in flight from the peer are dropped without a session.
        assert!(handler.handle(Inbound::Binary(Bytes::from_static(&[1, 2, 3]))).await);
        assert!(handler.session().is_none());

        handler.handle(voice_start()).await;
        match reply(&mut rx).await {
            ControlMessage::VoiceReady { session_id } => assert_ne!(session_id, id.to_string()),
            other => panic!("expected voice_ready, got {:?}", other),
        }
        assert_eq!(relay.session_count(), 1);
    }

    #[tokio::test]
    async fn test_session_ended_elsewhere_allows_restart() {
        let (mut handler, mut rx, relay, _backend) = setup();
        handler.handle(voice_start()).await;
        let id = handler.session().unwrap();
        let _ = reply(&mut rx).await;

        assert!(relay.end_session(id));
        handler.handle(voice_start()).await;
        assert!(matches!(reply(&mut rx).await, ControlMessage::VoiceReady { .. }));
    }

    #[tokio::test]
    async fn test_voice_error_releases_local_session() {
        let (mut handler, _rx, relay, backend) = setup();
        handler.start_session().await.unwrap();
        assert_eq!(backend.opened(), 2);

        let refused = ControlMessage::VoiceError {
            message: "format mismatch".into(),
        };
        assert!(handler.handle(text(refused)).await);

        assert!(handler.session().is_none());
        assert_eq!(relay.session_count(), 0);
        assert_eq!(backend.closed(), 2);
        assert_eq!(handler.take_refusal().as_deref(), Some("format mismatch"));
        assert_eq!(handler.take_refusal(), None);
    }

    #[tokio::test]
    async fn test_binary_without_session_and_plain_text_are_ignored() {
        let (mut handler, _rx, relay, _backend) = setup();
        assert!(handler.handle(Inbound::Binary(Bytes::from_static(&[1, 2]))).await);
        assert!(handler.handle(Inbound::Text("Hello Websocket!".into())).await);
        assert_eq!(relay.session_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_ends_session() {
        let (mut handler, _rx, relay, backend) = setup();
        handler.handle(voice_start()).await;
        drop(handler);
        assert_eq!(relay.session_count(), 0);
        assert_eq!(backend.closed(), 2);
    }
}
