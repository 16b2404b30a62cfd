//! Playback side: pop one frame per block and decode it into the device buffer
//!
//! Runs inside the playback device callback, so it never waits: an empty
//! queue or an undecodable frame both leave the block silent.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::stats::{should_log, RelayStats};
use crate::audio::buffer::SharedFrameQueue;
use crate::codec::FrameDecoder;

/// What happened to one playback block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// A frame was decoded; holds the number of samples written
    Played(usize),
    /// No frame was queued
    Underrun,
    DecodeFailed,
    Inactive,
}

pub struct PlaybackDecodePath<D: FrameDecoder> {
    decoder: D,
    queue: SharedFrameQueue,
    live: Arc<AtomicBool>,
    stats: Arc<RelayStats>,
}

impl<D: FrameDecoder> PlaybackDecodePath<D> {
    pub fn new(decoder: D, queue: SharedFrameQueue, live: Arc<AtomicBool>, stats: Arc<RelayStats>) -> Self {
        Self {
            decoder,
            queue,
            live,
            stats,
        }
    }

    /// Fill one output block
    pub fn process(&mut self, out: &mut [f32]) -> PlaybackOutcome {
        out.fill(0.0);

        if !self.live.load(Ordering::Acquire) {
            return PlaybackOutcome::Inactive;
        }

        let Some(frame) = self.queue.try_pop() else {
            RelayStats::bump(&self.stats.underruns);
            return PlaybackOutcome::Underrun;
        };

        match self.decoder.decode_into(&frame, out) {
            Ok(written) => {
                if written < out.len() {
                    out[written..].fill(0.0);
                }
                RelayStats::bump(&self.stats.frames_played);
                PlaybackOutcome::Played(written)
            }
            Err(e) => {
                // Partial output from a rejected frame is never played.
                out.fill(0.0);
                let count = RelayStats::bump(&self.stats.decode_errors);
                if should_log(count) {
                    tracing::warn!("Dropped undecodable frame of {} bytes ({} so far): {}", frame.len(), count, e);
                }
                PlaybackOutcome::DecodeFailed
            }
        }
    }
}
