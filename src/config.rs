//! Relay configuration
//!
//! Everything is serde-deserializable from TOML and has working defaults,
//! so a missing config file is not an error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub audio: AudioConfig,
    pub opus: OpusConfig,
    pub network: NetworkConfig,
    pub server: ServerConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, or from the per-user default location if
    /// it exists, or fall back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(default) if default.exists() => Self::load(default),
            _ => Ok(Self::default()),
        }
    }

    /// Per-user config file location
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "ws-voice-relay")
            .map(|dirs| dirs.config_dir().join("relay.toml"))
    }

    /// Check every value the audio path depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.audio.validate()?;
        self.opus.validate()?;

        if self.network.outbound_capacity == 0 {
            return Err(ConfigError::Invalid(
                "network.outbound_capacity must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Opus settings bound to the stream parameters of this config
    pub fn opus_for_stream(&self) -> OpusConfig {
        let mut opus = self.opus.clone();
        opus.sample_rate = self.audio.sample_rate;
        opus.channels = self.audio.channels;
        opus.frame_size = OpusConfig::frame_size_from_ms(self.audio.sample_rate, self.audio.block_ms);
        opus
    }
}

/// Audio stream settings shared by capture and playback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Channel count (1 or 2)
    pub channels: u16,

    /// Duration of one device block and one codec frame, in milliseconds
    pub block_ms: f32,

    /// Capacity of the inbound frame queue, in frames
    pub queue_capacity: usize,

    /// Encoded frames at or below this many bytes are not sent
    pub silence_threshold_bytes: usize,

    /// Playback device name (empty means host default)
    pub playback_device: String,

    /// Capture device name (empty means host default)
    pub capture_device: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            block_ms: DEFAULT_BLOCK_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            silence_threshold_bytes: DEFAULT_SILENCE_THRESHOLD_BYTES,
            playback_device: String::new(),
            capture_device: String::new(),
        }
    }
}

impl AudioConfig {
    /// Samples per block, all channels included
    pub fn block_len(&self) -> usize {
        OpusConfig::frame_size_from_ms(self.sample_rate, self.block_ms) * self.channels as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !OPUS_SAMPLE_RATES.contains(&self.sample_rate) {
            return Err(ConfigError::Invalid(format!(
                "audio.sample_rate {} is not an Opus rate",
                self.sample_rate
            )));
        }
        if !(1..=2).contains(&self.channels) {
            return Err(ConfigError::Invalid(format!(
                "audio.channels must be 1 or 2, got {}",
                self.channels
            )));
        }
        if !OPUS_FRAME_MS.iter().any(|ms| (ms - self.block_ms).abs() < f32::EPSILON) {
            return Err(ConfigError::Invalid(format!(
                "audio.block_ms {} is not an Opus frame duration",
                self.block_ms
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("audio.queue_capacity must be positive".into()));
        }
        Ok(())
    }
}

/// Opus application profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpusApplication {
    /// Speech, tuned for intelligibility
    Voip,
    /// General audio, tuned for fidelity
    Audio,
    /// Restricted low delay mode
    LowDelay,
}

/// Opus encoder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpusConfig {
    pub application: OpusApplication,
    pub bitrate: u32,
    pub vbr: bool,
    pub cvbr: bool,
    pub fec: bool,
    pub packet_loss_perc: u8,

    /// Filled in from [`AudioConfig`] by [`RelayConfig::opus_for_stream`]
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel per frame
    pub frame_size: usize,
}

impl Default for OpusConfig {
    fn default() -> Self {
        Self::voice()
    }
}

impl OpusConfig {
    /// Preset for speech
    pub fn voice() -> Self {
        Self {
            application: OpusApplication::Voip,
            bitrate: 24_000,
            vbr: true,
            cvbr: false,
            fec: false,
            packet_loss_perc: 0,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            frame_size: Self::frame_size_from_ms(DEFAULT_SAMPLE_RATE, DEFAULT_BLOCK_MS),
        }
    }

    /// Preset for music, closest to a plain `Audio` application encoder
    pub fn music() -> Self {
        Self {
            application: OpusApplication::Audio,
            bitrate: 64_000,
            cvbr: true,
            ..Self::voice()
        }
    }

    /// Samples per channel for a frame of `ms` milliseconds
    pub fn frame_size_from_ms(sample_rate: u32, ms: f32) -> usize {
        (sample_rate as f32 * ms / 1000.0).round() as usize
    }

    pub fn frame_duration_ms(&self) -> f32 {
        self.frame_size as f32 * 1000.0 / self.sample_rate as f32
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(500..=512_000).contains(&self.bitrate) {
            return Err(ConfigError::Invalid(format!(
                "opus.bitrate {} outside 500..=512000",
                self.bitrate
            )));
        }
        if self.packet_loss_perc > 100 {
            return Err(ConfigError::Invalid("opus.packet_loss_perc above 100".into()));
        }
        Ok(())
    }
}

/// Connection-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Frames allowed to wait for the socket writer before capture drops them
    pub outbound_capacity: usize,

    /// Server URL the client connects to
    pub server_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            server_url: format!("ws://127.0.0.1:{}{}", DEFAULT_WS_PORT, DEFAULT_WS_PATH),
        }
    }
}

/// HTTP / WebSocket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: DEFAULT_WS_PORT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.block_len(), 320);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RelayConfig::from_toml(
            r#"
            [audio]
            queue_capacity = 1000
            block_ms = 2.5

            [server]
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(config.audio.queue_capacity, 1000);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.block_len(), 40);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.opus.application, OpusApplication::Voip);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RelayConfig::from_toml("[audio]\nqueue_capacity = 0").is_err());
        assert!(RelayConfig::from_toml("[audio]\nsample_rate = 44100").is_err());
        assert!(RelayConfig::from_toml("[audio]\nblock_ms = 7.0").is_err());
        assert!(RelayConfig::from_toml("[audio]\nchannels = 6").is_err());
        assert!(RelayConfig::from_toml("[network]\noutbound_capacity = 0").is_err());
    }

    #[test]
    fn test_opus_for_stream() {
        let mut config = RelayConfig::default();
        config.audio.block_ms = 10.0;
        let opus = config.opus_for_stream();
        assert_eq!(opus.frame_size, 160);
        assert!((opus.frame_duration_ms() - 10.0).abs() < 0.01);
    }
}
