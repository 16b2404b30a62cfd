//! Text control messages exchanged over the WebSocket
//!
//! Binary messages are always compressed audio frames; text messages carry
//! these JSON objects, tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::config::AudioConfig;
use crate::error::ChannelError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Sender can do voice with these stream parameters
    VoiceStart {
        sample_rate: u32,
        channels: u16,
        block_ms: f32,
    },
    /// Receiver started its side of the call
    VoiceReady { session_id: String },
    /// Receiver could not start its side of the call
    VoiceError { message: String },
    /// End the call but keep the connection
    VoiceStop,
    /// Free text
    Text { body: String },
}

impl ControlMessage {
    pub fn voice_start(audio: &AudioConfig) -> Self {
        ControlMessage::VoiceStart {
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            block_ms: audio.block_ms,
        }
    }

    pub fn parse(text: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(text).map_err(|e| ChannelError::Protocol(e.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Serializing these plain enums cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Check a `VoiceStart` from the peer against our own stream format
    pub fn check_compatible(&self, audio: &AudioConfig) -> Result<(), String> {
        match self {
            ControlMessage::VoiceStart {
                sample_rate,
                channels,
                block_ms,
            } => {
                if *sample_rate != audio.sample_rate
                    || *channels != audio.channels
                    || (*block_ms - audio.block_ms).abs() > f32::EPSILON
                {
                    Err(format!(
                        "peer uses {} Hz/{} ch/{} ms, local is {} Hz/{} ch/{} ms",
                        sample_rate, channels, block_ms, audio.sample_rate, audio.channels, audio.block_ms
                    ))
                } else {
                    Ok(())
                }
            }
            _ => Err("not a voice_start message".into()),
        }
    }
}
