//! Voice session lifecycle
//!
//! A session owns everything one call needs: the encoder (inside the capture
//! callback), the decoder (inside the playback callback), both device
//! streams, and the inbound frame queue.
//!
//! ```text
//!  Initializing ──ok──▶ Active ──close()──▶ Closing ──▶ Closed
//!        │                                                ▲
//!        └──────────────── any failure ───────────────────┘
//! ```
//!
//! Resources acquired while initializing are plain values, so an early `?`
//! return drops them in reverse order of acquisition. Closing gates the
//! callbacks off, closes the capture and then the playback stream (joining
//! their threads and dropping the codecs with the callbacks), and finally
//! clears the queue.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::capture::CaptureEncodePath;
use super::playback::PlaybackDecodePath;
use super::stats::{RelayStats, StatsSnapshot};
use crate::audio::buffer::{create_shared_queue, Frame, SharedFrameQueue};
use crate::audio::{AudioBackend, AudioStream, StreamParams};
use crate::codec::{OpusDecoder, OpusEncoder};
use crate::config::RelayConfig;
use crate::error::{ChannelError, SessionError};
use crate::net::channel::DuplexChannel;

/// Identity of one session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Active,
    Closing,
    Closed,
}

/// Snapshot of a session for status reporting
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: SessionId,
    pub state: SessionState,
    pub playback_device: String,
    pub capture_device: String,
    pub started_at: DateTime<Utc>,
    pub queue_len: usize,
    pub queue_capacity: usize,
    pub stats: StatsSnapshot,
}

struct SessionStreams {
    playback: Box<dyn AudioStream>,
    capture: Box<dyn AudioStream>,
}

/// One active voice call
pub struct AudioSession {
    id: SessionId,
    state: Mutex<SessionState>,
    streams: Mutex<Option<SessionStreams>>,
    queue: SharedFrameQueue,
    channel: Arc<dyn DuplexChannel>,
    live: Arc<AtomicBool>,
    stats: Arc<RelayStats>,
    playback_device: String,
    capture_device: String,
    started_at: DateTime<Utc>,
}

impl AudioSession {
    /// Create codecs, open both devices and go live.
    ///
    /// On error nothing stays acquired and no callback has seen the session.
    pub fn start(
        backend: &dyn AudioBackend,
        config: &RelayConfig,
        channel: Arc<dyn DuplexChannel>,
        playback_device: &str,
        capture_device: &str,
    ) -> Result<Self, SessionError> {
        let id = SessionId::new();
        tracing::info!(session = %id, "Initializing voice session");

        let result = Self::initialize(id, backend, config, channel, playback_device, capture_device);
        if let Err(e) = &result {
            tracing::error!(session = %id, "Voice session failed to start: {}", e);
        }
        result
    }

    fn initialize(
        id: SessionId,
        backend: &dyn AudioBackend,
        config: &RelayConfig,
        channel: Arc<dyn DuplexChannel>,
        playback_device: &str,
        capture_device: &str,
    ) -> Result<Self, SessionError> {
        if !channel.is_open() {
            return Err(SessionError::ChannelClosed);
        }

        let params = StreamParams::from_config(&config.audio);
        let opus = config.opus_for_stream();

        let encoder = OpusEncoder::new(opus.clone())?;
        let decoder = OpusDecoder::new(opus.sample_rate, opus.channels)?;
        tracing::debug!(
            session = %id,
            "Opus ready: {} Hz, {} channel(s), {} samples/frame ({:.1} ms)",
            opus.sample_rate,
            opus.channels,
            encoder.frame_size(),
            encoder.frame_duration_ms()
        );

        let queue = create_shared_queue(config.audio.queue_capacity);
        let live = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(RelayStats::default());

        let mut playback_path = PlaybackDecodePath::new(decoder, queue.clone(), live.clone(), stats.clone());
        let playback = backend.open_playback(
            playback_device,
            params,
            Box::new(move |out: &mut [f32]| {
                playback_path.process(out);
            }),
        )?;

        let mut capture_path = CaptureEncodePath::new(
            encoder,
            channel.clone(),
            config.audio.silence_threshold_bytes,
            live.clone(),
            stats.clone(),
        );
        // If this fails `playback` is dropped on return, closing that device.
        let capture = backend.open_capture(
            capture_device,
            params,
            Box::new(move |pcm: &[f32]| {
                capture_path.process(pcm);
            }),
        )?;

        live.store(true, Ordering::Release);
        tracing::info!(
            session = %id,
            "Voice session active (playback '{}', capture '{}', queue {})",
            playback.device_name(),
            capture.device_name(),
            queue.capacity()
        );

        Ok(Self {
            id,
            state: Mutex::new(SessionState::Active),
            streams: Mutex::new(Some(SessionStreams { playback, capture })),
            queue,
            channel,
            live,
            stats,
            playback_device: playback_device.to_string(),
            capture_device: capture_device.to_string(),
            started_at: Utc::now(),
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Send a control message to the peer on this session's channel
    pub fn notify_peer(&self, text: String) -> Result<(), ChannelError> {
        self.channel.send_control(text)
    }

    /// Queue one inbound frame for playback. Returns false if the session is
    /// not active and the frame was discarded.
    pub fn deliver(&self, frame: Frame) -> bool {
        if !self.is_active() {
            return false;
        }

        RelayStats::bump(&self.stats.frames_received);
        if self.queue.push(frame).is_some() {
            RelayStats::bump(&self.stats.overflow_evictions);
        }
        true
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            state: self.state(),
            playback_device: self.playback_device.clone(),
            capture_device: self.capture_device.clone(),
            started_at: self.started_at,
            queue_len: self.queue.len(),
            queue_capacity: self.queue.capacity(),
            stats: self.stats.snapshot(),
        }
    }

    /// Tear the session down. Returns false if it was already closing or closed.
    pub fn close(&self) -> bool {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Closing | SessionState::Closed => return false,
                _ => *state = SessionState::Closing,
            }
        }

        self.live.store(false, Ordering::Release);

        if let Some(mut streams) = self.streams.lock().take() {
            // Reverse order of acquisition.
            streams.capture.close();
            streams.playback.close();
        }

        let released = self.queue.clear();
        *self.state.lock() = SessionState::Closed;

        let stats = self.stats.snapshot();
        tracing::info!(
            session = %self.id,
            "Voice session closed: sent {}, received {}, played {}, underruns {}, evicted {}, released {} queued",
            stats.frames_sent,
            stats.frames_received,
            stats.frames_played,
            stats.underruns,
            stats.overflow_evictions,
            released
        );
        true
    }
}

impl Drop for AudioSession {
    fn drop(&mut self) {
        self.close();
    }
}
