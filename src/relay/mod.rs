//! Duplex voice relay
//!
//! Capture → encode → channel on the way out; channel → frame queue → decode
//! → playback on the way in.

pub mod capture;
pub mod manager;
pub mod playback;
pub mod session;
pub mod stats;

pub use capture::{CaptureEncodePath, CaptureOutcome};
pub use manager::VoiceRelay;
pub use playback::{PlaybackDecodePath, PlaybackOutcome};
pub use session::{AudioSession, SessionId, SessionInfo, SessionState};
pub use stats::{RelayStats, StatsSnapshot};
