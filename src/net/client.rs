//! WebSocket client that dials a relay server and starts a call

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use super::channel::{Outbound, WsChannel};
use super::connection::{ConnectionHandler, DeviceSelection, Inbound};
use crate::error::{ChannelError, SessionError};
use crate::protocol::ControlMessage;
use crate::relay::VoiceRelay;

pub struct VoiceClient {
    relay: Arc<VoiceRelay>,
    devices: DeviceSelection,
}

impl VoiceClient {
    pub fn new(relay: Arc<VoiceRelay>, devices: DeviceSelection) -> Self {
        Self { relay, devices }
    }

    /// Connect, run the call until `shutdown` resolves or the server hangs up
    pub async fn run<F>(&self, url: &str, shutdown: F) -> crate::Result<()>
    where
        F: Future<Output = ()>,
    {
        let (socket, _) = connect_async(url)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;
        tracing::info!("Connected to {}", url);

        let (mut sink, mut stream) = socket.split();
        let (channel, mut rx) = WsChannel::new(self.relay.config().network.outbound_capacity);

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

        let mut handler = ConnectionHandler::new(self.relay.clone(), channel.clone(), self.devices.clone(), url);

        let result = self.call(&mut handler, &channel, &mut stream, shutdown).await;

        handler.shutdown().await;
        drop(channel);
        let _ = writer.await;
        tracing::info!("Disconnected from {}", url);
        result
    }

    async fn call<S, F>(
        &self,
        handler: &mut ConnectionHandler,
        channel: &WsChannel,
        stream: &mut S,
        shutdown: F,
    ) -> crate::Result<()>
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
        F: Future<Output = ()>,
    {
        handler.start_session().await?;
        channel
            .send_text(ControlMessage::voice_start(&self.relay.config().audio).to_json())
            .await?;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    let _ = channel.send_text(ControlMessage::VoiceStop.to_json()).await;
                    return Ok(());
                }
                message = stream.next() => {
                    let inbound = match message {
                        Some(Ok(Message::Binary(data))) => Inbound::Binary(Bytes::from(data)),
                        Some(Ok(Message::Text(text))) => Inbound::Text(text),
                        Some(Ok(Message::Close(_))) | None => Inbound::Close,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => {
                            channel.mark_closed();
                            return Err(ChannelError::Protocol(e.to_string()).into());
                        }
                    };
                    if !handler.handle(inbound).await {
                        channel.mark_closed();
                        return Ok(());
                    }
                    if let Some(reason) = handler.take_refusal() {
                        return Err(SessionError::Refused(reason).into());
                    }
                    if handler.session().is_none() {
                        tracing::info!("Call ended by server");
                        return Ok(());
                    }
                }
            }
        }
    }
}
