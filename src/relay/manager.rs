//! Session registry
//!
//! Connections refer to their session by [`SessionId`] only; the registry owns
//! the sessions, so a late inbound frame for a session that has ended finds
//! nothing instead of a dangling reference.

use dashmap::DashMap;
use std::sync::Arc;

use super::session::{AudioSession, SessionId, SessionInfo};
use crate::audio::buffer::Frame;
use crate::audio::{AudioBackend, CpalBackend};
use crate::config::RelayConfig;
use crate::error::SessionError;
use crate::net::channel::DuplexChannel;
use crate::protocol::ControlMessage;

pub struct VoiceRelay {
    backend: Arc<dyn AudioBackend>,
    config: RelayConfig,
    sessions: DashMap<SessionId, Arc<AudioSession>>,
}

impl VoiceRelay {
    pub fn new(backend: Arc<dyn AudioBackend>, config: RelayConfig) -> Self {
        Self {
            backend,
            config,
            sessions: DashMap::new(),
        }
    }

    /// Relay on the default cpal host
    pub fn with_cpal(config: RelayConfig) -> Self {
        Self::new(Arc::new(CpalBackend::new()), config)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Start a voice session for `connection`.
    ///
    /// Opens audio devices, so call it from a context that may block briefly.
    pub fn start_session(
        &self,
        connection: Arc<dyn DuplexChannel>,
        playback_device: &str,
        capture_device: &str,
    ) -> Result<SessionId, SessionError> {
        let session = AudioSession::start(
            self.backend.as_ref(),
            &self.config,
            connection,
            playback_device,
            capture_device,
        )?;

        let id = session.id();
        self.sessions.insert(id, Arc::new(session));
        tracing::debug!(session = %id, "Registered session ({} active)", self.sessions.len());
        Ok(id)
    }

    /// Hand an inbound frame to its session's queue
    pub fn deliver(&self, id: SessionId, frame: Frame) -> bool {
        match self.sessions.get(&id) {
            Some(session) => session.deliver(frame),
            None => false,
        }
    }

    /// Teardown hook for a closed connection. Unknown or already ended ids are a no-op.
    pub fn end_session(&self, id: SessionId) -> bool {
        // Remove first so no new frame can reach the session while it closes.
        match self.sessions.remove(&id) {
            Some((_, session)) => session.close(),
            None => false,
        }
    }

    /// End a session from outside its connection, telling the peer the call is over.
    ///
    /// The connection that owns the session sees it gone on its next message.
    pub fn hang_up(&self, id: SessionId) -> bool {
        let Some((_, session)) = self.sessions.remove(&id) else {
            return false;
        };

        if let Err(e) = session.notify_peer(ControlMessage::VoiceStop.to_json()) {
            tracing::debug!(session = %id, "Could not notify peer of hang-up: {}", e);
        }
        session.close()
    }

    /// Close every session, e.g. on process shutdown
    pub fn shutdown_all(&self) -> usize {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        let closed = ids.into_iter().filter(|id| self.end_session(*id)).count();
        if closed > 0 {
            tracing::info!("Closed {} voice session(s) on shutdown", closed);
        }
        closed
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<AudioSession>> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.sessions.iter().map(|entry| entry.value().info()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
