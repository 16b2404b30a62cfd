//! # WebSocket Voice Relay
//!
//! Full-duplex Opus voice calls between two peers over one WebSocket.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                         AudioSession (relay::session)                 │
//! │                                                                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────────────┐   │
//! │  │  Capture    │──▶│ Opus Encoder │──▶│ DuplexChannel::send_binary│──┼──▶ WebSocket
//! │  │  Thread     │   │ (silence cut)│   │  (bounded, never blocks) │   │
//! │  └─────────────┘   └──────────────┘   └──────────────────────────┘   │
//! │                                                                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────────────┐   │
//! │  │  Playback   │◀──│ Opus Decoder │◀──│ BoundedFrameQueue        │◀─┼─── WebSocket
//! │  │  Thread     │   │ (zero on err)│   │  (drop-oldest, 100)      │   │
//! │  └─────────────┘   └──────────────┘   └──────────────────────────┘   │
//! └──────────────────────────────────────────────────────────────────────┘
//!
//!   VoiceRelay (relay::manager) owns sessions keyed by SessionId.
//!   net::server (axum) and net::client (tungstenite) route socket
//!   messages into sessions through net::connection.
//! ```

pub mod audio;
pub mod codec;
pub mod config;
pub mod error;
pub mod net;
pub mod protocol;
pub mod relay;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default sample rate for voice
    pub const DEFAULT_SAMPLE_RATE: u32 = 16000;

    /// Default channel count (mono)
    pub const DEFAULT_CHANNELS: u16 = 1;

    /// Default block duration in milliseconds
    pub const DEFAULT_BLOCK_MS: f32 = 20.0;

    /// Capacity of the inbound frame queue (in frames)
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

    /// Encoded frames at or below this size are treated as silence
    pub const DEFAULT_SILENCE_THRESHOLD_BYTES: usize = 3;

    /// Outbound messages buffered in front of the socket writer
    pub const DEFAULT_OUTBOUND_CAPACITY: usize = 50;

    /// Default WebSocket port
    pub const DEFAULT_WS_PORT: u16 = 8080;

    /// WebSocket endpoint path
    pub const DEFAULT_WS_PATH: &str = "/ws";

    /// Sample rates accepted by Opus
    pub const OPUS_SAMPLE_RATES: [u32; 5] = [8000, 12000, 16000, 24000, 48000];

    /// Frame durations accepted by Opus, in milliseconds
    pub const OPUS_FRAME_MS: [f32; 6] = [2.5, 5.0, 10.0, 20.0, 40.0, 60.0];

    /// Rate-limit for per-frame warnings from the audio callbacks
    pub const LOG_EVERY_N: u64 = 500;
}
