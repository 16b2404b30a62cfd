//! Opus codec wrapper
//!
//! One encoder per outbound direction and one decoder per inbound direction.
//! The relay paths only see the two traits below, which keeps them testable
//! without a real codec.

pub mod decoder;
pub mod encoder;

pub use decoder::OpusDecoder;
pub use encoder::OpusEncoder;

use crate::audio::buffer::Frame;
use crate::error::CodecError;

/// Compresses fixed-size PCM blocks into frames
pub trait FrameEncoder: Send {
    /// Encode exactly one block of interleaved samples
    fn encode(&mut self, pcm: &[f32]) -> Result<Frame, CodecError>;
}

/// Expands frames back into PCM
pub trait FrameDecoder: Send {
    /// Decode `frame` into `out`, returning the number of samples written.
    ///
    /// On error the contents of `out` are unspecified.
    fn decode_into(&mut self, frame: &[u8], out: &mut [f32]) -> Result<usize, CodecError>;
}
