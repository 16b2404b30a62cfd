//! Audio subsystem module
//!
//! The relay talks to audio hardware only through [`AudioBackend`]: it hands
//! over a typed callback per direction and gets back a stream handle that
//! owns the device. Closing (or dropping) the handle stops the device and
//! drops the callback, so nothing the callback captured can outlive it.

pub mod blocks;
pub mod buffer;
pub mod device;
pub mod stream;

#[cfg(test)]
pub(crate) mod mock;

pub use blocks::{CaptureBlocker, PlaybackBlocker};
pub use buffer::{create_shared_queue, BoundedFrameQueue, Frame, SharedFrameQueue};
pub use stream::{CpalBackend, CpalStream};

use crate::config::AudioConfig;
use crate::error::AudioError;

/// Invoked with one full block of captured interleaved samples
pub type CaptureCallback = Box<dyn FnMut(&[f32]) + Send + 'static>;

/// Invoked with one block of interleaved samples to fill for playback
pub type PlaybackCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Capture,
    Playback,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Capture => write!(f, "capture"),
            Direction::Playback => write!(f, "playback"),
        }
    }
}

/// Format shared by both device streams of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per callback block, all channels included
    pub block_len: usize,
}

impl StreamParams {
    pub fn from_config(config: &AudioConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            block_len: config.block_len(),
        }
    }

    /// Sample frames (per-channel samples) in one block
    pub fn frames_per_block(&self) -> usize {
        self.block_len / self.channels as usize
    }
}

/// An open device stream
pub trait AudioStream: Send {
    fn device_name(&self) -> &str;

    fn direction(&self) -> Direction;

    /// Stop the device and release it.
    ///
    /// Once this returns the callback will not be invoked again and has been
    /// dropped. Calling it again is a no-op.
    fn close(&mut self);
}

/// Host audio subsystem
pub trait AudioBackend: Send + Sync {
    /// Open and start a capture stream on `device` (empty name: host default)
    fn open_capture(
        &self,
        device: &str,
        params: StreamParams,
        callback: CaptureCallback,
    ) -> Result<Box<dyn AudioStream>, AudioError>;

    /// Open and start a playback stream on `device` (empty name: host default)
    fn open_playback(
        &self,
        device: &str,
        params: StreamParams,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn AudioStream>, AudioError>;
}
