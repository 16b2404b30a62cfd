//! Capture side: encode each microphone block and send it
//!
//! Runs inside the capture device callback. Outbound frames bypass the
//! frame queue and go straight to the channel, whose `send_binary` never
//! blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::stats::{should_log, RelayStats};
use crate::codec::FrameEncoder;
use crate::error::ChannelError;
use crate::net::channel::DuplexChannel;

/// What happened to one captured block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    Sent,
    /// Encoded at or below the silence threshold, not sent
    Silence,
    /// Channel closed or outbound queue full, frame discarded
    Dropped,
    EncodeFailed,
    /// Session not active, block ignored
    Inactive,
}

pub struct CaptureEncodePath<E: FrameEncoder> {
    encoder: E,
    channel: Arc<dyn DuplexChannel>,
    silence_threshold: usize,
    live: Arc<AtomicBool>,
    stats: Arc<RelayStats>,
}

impl<E: FrameEncoder> CaptureEncodePath<E> {
    pub fn new(
        encoder: E,
        channel: Arc<dyn DuplexChannel>,
        silence_threshold: usize,
        live: Arc<AtomicBool>,
        stats: Arc<RelayStats>,
    ) -> Self {
        Self {
            encoder,
            channel,
            silence_threshold,
            live,
            stats,
        }
    }

    /// Handle one captured block
    pub fn process(&mut self, pcm: &[f32]) -> CaptureOutcome {
        if !self.live.load(Ordering::Acquire) {
            return CaptureOutcome::Inactive;
        }

        let frame = match self.encoder.encode(pcm) {
            Ok(frame) => frame,
            Err(e) => {
                let count = RelayStats::bump(&self.stats.encode_errors);
                if should_log(count) {
                    tracing::warn!("Encoding failed ({} so far): {}", count, e);
                }
                return CaptureOutcome::EncodeFailed;
            }
        };

        if frame.len() <= self.silence_threshold {
            RelayStats::bump(&self.stats.silence_suppressed);
            return CaptureOutcome::Silence;
        }

        // The channel may close between this check and the send; the send
        // then reports Closed and the frame is dropped like any other.
        if !self.channel.is_open() {
            RelayStats::bump(&self.stats.channel_drops);
            return CaptureOutcome::Dropped;
        }

        let len = frame.len() as u64;
        match self.channel.send_binary(frame) {
            Ok(()) => {
                RelayStats::bump(&self.stats.frames_sent);
                self.stats.bytes_sent.fetch_add(len, Ordering::Relaxed);
                CaptureOutcome::Sent
            }
            Err(e) => {
                let count = RelayStats::bump(&self.stats.channel_drops);
                if e == ChannelError::Full && should_log(count) {
                    tracing::warn!("Outbound queue full, dropped {} frames so far", count);
                }
                CaptureOutcome::Dropped
            }
        }
    }
}
