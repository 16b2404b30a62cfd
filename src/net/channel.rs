//! Duplex message channel used by the relay
//!
//! The capture callback sends through [`DuplexChannel::send_binary`], which
//! must never block. [`WsChannel`] satisfies this with a bounded queue in
//! front of the socket writer task: when the writer falls behind, frames are
//! refused with [`ChannelError::Full`] instead of stalling the device.

use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::audio::buffer::Frame;
use crate::error::ChannelError;

/// Message-oriented, full-duplex connection as seen by a voice session
pub trait DuplexChannel: Send + Sync {
    fn is_open(&self) -> bool;

    /// Queue one binary message without blocking
    fn send_binary(&self, frame: Frame) -> Result<(), ChannelError>;

    /// Queue one control text message without blocking
    fn send_control(&self, text: String) -> Result<(), ChannelError>;

    /// Start closing the connection
    fn close(&self);
}

/// Message for the socket writer task
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Binary(Bytes),
    Text(String),
    Close,
}

/// Channel endpoint backed by a WebSocket writer task
pub struct WsChannel {
    tx: mpsc::Sender<Outbound>,
    open: AtomicBool,
}

impl WsChannel {
    /// Create the channel and the receiver its writer task drains
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        let channel = Arc::new(Self {
            tx,
            open: AtomicBool::new(true),
        });
        (channel, rx)
    }

    /// Queue a text message; waits for room since text is never sent from a callback
    pub async fn send_text(&self, text: String) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }
        self.tx
            .send(Outbound::Text(text))
            .await
            .map_err(|_| ChannelError::Closed)
    }

    /// Record that the peer or the transport closed the connection
    pub fn mark_closed(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
}

impl DuplexChannel for WsChannel {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst) && !self.tx.is_closed()
    }

    fn send_binary(&self, frame: Frame) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }

        match self.tx.try_send(Outbound::Binary(frame.into_bytes())) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ChannelError::Full),
            Err(TrySendError::Closed(_)) => {
                self.mark_closed();
                Err(ChannelError::Closed)
            }
        }
    }

    fn send_control(&self, text: String) -> Result<(), ChannelError> {
        if !self.is_open() {
            return Err(ChannelError::Closed);
        }

        self.tx.try_send(Outbound::Text(text)).map_err(|e| match e {
            TrySendError::Full(_) => ChannelError::Full,
            TrySendError::Closed(_) => ChannelError::Closed,
        })
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            let _ = self.tx.try_send(Outbound::Close);
        }
    }
}
