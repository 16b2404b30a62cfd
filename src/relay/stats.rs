//! Per-session relay counters
//!
//! Updated from the audio callbacks with relaxed atomics only.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::LOG_EVERY_N;

#[derive(Debug, Default)]
pub struct RelayStats {
    pub frames_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub silence_suppressed: AtomicU64,
    pub channel_drops: AtomicU64,
    pub encode_errors: AtomicU64,
    pub frames_received: AtomicU64,
    pub overflow_evictions: AtomicU64,
    pub frames_played: AtomicU64,
    pub underruns: AtomicU64,
    pub decode_errors: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub silence_suppressed: u64,
    pub channel_drops: u64,
    pub encode_errors: u64,
    pub frames_received: u64,
    pub overflow_evictions: u64,
    pub frames_played: u64,
    pub underruns: u64,
    pub decode_errors: u64,
}

impl RelayStats {
    /// Increment `counter`, returning the new value
    pub fn bump(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            frames_sent: load(&self.frames_sent),
            bytes_sent: load(&self.bytes_sent),
            silence_suppressed: load(&self.silence_suppressed),
            channel_drops: load(&self.channel_drops),
            encode_errors: load(&self.encode_errors),
            frames_received: load(&self.frames_received),
            overflow_evictions: load(&self.overflow_evictions),
            frames_played: load(&self.frames_played),
            underruns: load(&self.underruns),
            decode_errors: load(&self.decode_errors),
        }
    }
}

/// Log the first occurrence and then every `LOG_EVERY_N`th
pub fn should_log(count: u64) -> bool {
    count == 1 || count % LOG_EVERY_N == 0
}
