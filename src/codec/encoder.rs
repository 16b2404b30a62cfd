//! Opus encoder wrapper

use bytes::Bytes;
use opus::{Application, Channels, Encoder};

use super::FrameEncoder;
use crate::audio::buffer::Frame;
use crate::config::{OpusApplication, OpusConfig};
use crate::error::CodecError;

/// Largest packet Opus will produce for a single frame
const MAX_PACKET_SIZE: usize = 1275;

/// Opus encoder for one outbound stream
pub struct OpusEncoder {
    encoder: Encoder,
    config: OpusConfig,
    /// Encoding buffer (reused to avoid allocations)
    encode_buffer: Vec<u8>,
}

impl OpusEncoder {
    /// Create a new Opus encoder with the specified configuration
    pub fn new(config: OpusConfig) -> Result<Self, CodecError> {
        let channels = opus_channels(config.channels).ok_or_else(|| {
            CodecError::EncoderInit(format!("Unsupported channel count: {}", config.channels))
        })?;

        let application = match config.application {
            OpusApplication::Voip => Application::Voip,
            OpusApplication::Audio => Application::Audio,
            OpusApplication::LowDelay => Application::LowDelay,
        };

        let mut encoder = Encoder::new(config.sample_rate, channels, application)
            .map_err(|e| CodecError::EncoderInit(e.to_string()))?;

        Self::configure_encoder(&mut encoder, &config)?;

        Ok(Self {
            encoder,
            config,
            encode_buffer: vec![0u8; MAX_PACKET_SIZE],
        })
    }

    fn configure_encoder(encoder: &mut Encoder, config: &OpusConfig) -> Result<(), CodecError> {
        encoder
            .set_bitrate(opus::Bitrate::Bits(config.bitrate as i32))
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set bitrate: {}", e)))?;

        encoder
            .set_vbr(config.vbr)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set VBR: {}", e)))?;

        if config.vbr && config.cvbr {
            encoder
                .set_vbr_constraint(true)
                .map_err(|e| CodecError::EncoderInit(format!("Failed to set CVBR: {}", e)))?;
        }

        encoder
            .set_inband_fec(config.fec)
            .map_err(|e| CodecError::EncoderInit(format!("Failed to set FEC: {}", e)))?;

        if config.fec {
            encoder
                .set_packet_loss_perc(config.packet_loss_perc as i32)
                .map_err(|e| CodecError::EncoderInit(format!("Failed to set packet loss: {}", e)))?;
        }

        Ok(())
    }

    pub fn config(&self) -> &OpusConfig {
        &self.config
    }

    /// Samples per channel in one frame
    pub fn frame_size(&self) -> usize {
        self.config.frame_size
    }

    /// Samples per frame including all channels
    pub fn samples_per_frame(&self) -> usize {
        self.config.frame_size * self.config.channels as usize
    }

    pub fn frame_duration_ms(&self) -> f32 {
        self.config.frame_duration_ms()
    }
}

impl FrameEncoder for OpusEncoder {
    /// Input must be interleaved samples with length `frame_size * channels`
    fn encode(&mut self, pcm: &[f32]) -> Result<Frame, CodecError> {
        if pcm.len() != self.samples_per_frame() {
            return Err(CodecError::InvalidFrameSize(pcm.len()));
        }

        let size = self
            .encoder
            .encode_float(pcm, &mut self.encode_buffer)
            .map_err(|e| CodecError::EncodingFailed(e.to_string()))?;

        Ok(Frame::new(Bytes::copy_from_slice(&self.encode_buffer[..size])))
    }
}

pub(crate) fn opus_channels(channels: u16) -> Option<Channels> {
    match channels {
        1 => Some(Channels::Mono),
        2 => Some(Channels::Stereo),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine_block(len: usize, offset: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = (offset + i) as f32 / 16000.0;
                (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5
            })
            .collect()
    }

    #[test]
    fn test_encoder_creation() {
        let encoder = OpusEncoder::new(OpusConfig::voice()).unwrap();
        assert_eq!(encoder.config().sample_rate, 16000);
        assert_eq!(encoder.config().channels, 1);
        assert_eq!(encoder.frame_size(), 320);
        assert!((encoder.frame_duration_ms() - 20.0).abs() < 0.1);
    }

    #[test]
    fn test_encoding_compresses() {
        let mut encoder = OpusEncoder::new(OpusConfig::voice()).unwrap();
        let block = sine_block(encoder.samples_per_frame(), 0);

        let encoded = encoder.encode(&block).unwrap();
        assert!(!encoded.is_empty());
        assert!(encoded.len() < block.len() * 4);
    }

    #[test]
    fn test_wrong_block_size_rejected() {
        let mut encoder = OpusEncoder::new(OpusConfig::voice()).unwrap();
        let err = encoder.encode(&[0.0; 100]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidFrameSize(100)));
    }

    #[test]
    fn test_unsupported_channels() {
        let mut config = OpusConfig::voice();
        config.channels = 3;
        assert!(matches!(
            OpusEncoder::new(config),
            Err(CodecError::EncoderInit(_))
        ));
    }
}
