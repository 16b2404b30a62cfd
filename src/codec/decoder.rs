//! Opus decoder wrapper

use opus::Decoder;

use super::encoder::opus_channels;
use super::FrameDecoder;
use crate::error::CodecError;

/// Opus decoder for one inbound stream
pub struct OpusDecoder {
    decoder: Decoder,
    sample_rate: u32,
    channels: u16,
}

impl OpusDecoder {
    /// Create a new Opus decoder for `channels` interleaved channels at `sample_rate`
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, CodecError> {
        let opus_channels = opus_channels(channels).ok_or_else(|| {
            CodecError::DecoderInit(format!("Unsupported channel count: {}", channels))
        })?;

        let decoder = Decoder::new(sample_rate, opus_channels)
            .map_err(|e| CodecError::DecoderInit(e.to_string()))?;

        Ok(Self {
            decoder,
            sample_rate,
            channels,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}

impl FrameDecoder for OpusDecoder {
    fn decode_into(&mut self, frame: &[u8], out: &mut [f32]) -> Result<usize, CodecError> {
        // An empty packet would be taken as a loss-concealment request.
        if frame.is_empty() {
            return Err(CodecError::DecodingFailed("empty frame".into()));
        }

        let samples = self
            .decoder
            .decode_float(frame, out, false)
            .map_err(|e| CodecError::DecodingFailed(e.to_string()))?;

        Ok(samples * self.channels as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{FrameEncoder, OpusEncoder};
    use crate::config::OpusConfig;

    #[test]
    fn test_decoder_creation() {
        let decoder = OpusDecoder::new(16000, 1).unwrap();
        assert_eq!(decoder.sample_rate(), 16000);
        assert_eq!(decoder.channels(), 1);
    }

    #[test]
    fn test_decode_fills_block() {
        let mut encoder = OpusEncoder::new(OpusConfig::voice()).unwrap();
        let mut decoder = OpusDecoder::new(16000, 1).unwrap();

        let block: Vec<f32> = (0..encoder.samples_per_frame())
            .map(|i| (i as f32 * 0.05).sin() * 0.3)
            .collect();
        let encoded = encoder.encode(&block).unwrap();

        let mut out = vec![0.0f32; encoder.samples_per_frame()];
        let written = decoder.decode_into(&encoded, &mut out).unwrap();
        assert_eq!(written, out.len());
    }

    #[test]
    fn test_oversized_packet_rejected() {
        let mut decoder = OpusDecoder::new(16000, 1).unwrap();
        // TOC for a single 60 ms SILK frame, which cannot fit a 20 ms block.
        let packet = [0x18u8, 0x00, 0x00];
        let mut out = vec![0.0f32; 320];
        assert!(decoder.decode_into(&packet, &mut out).is_err());
    }

    #[test]
    fn test_empty_frame_rejected() {
        let mut decoder = OpusDecoder::new(16000, 1).unwrap();
        let mut out = vec![0.0f32; 320];
        assert!(decoder.decode_into(&[], &mut out).is_err());
    }
}
