//! In-process audio backend for tests
//!
//! Streams never touch hardware. Every opened stream keeps its own callback
//! under a [`MockStreamId`], so several sessions can share one backend; tests
//! drive the callbacks by hand and read acquire/release counters.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{AudioBackend, AudioStream, CaptureCallback, Direction, PlaybackCallback, StreamParams};
use crate::error::AudioError;

/// Device name that always fails to open
pub const MISSING_DEVICE: &str = "missing";

/// Handle to one stream opened on a [`MockBackend`], in open order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MockStreamId(usize);

enum Slot {
    Capture(CaptureCallback),
    Playback(PlaybackCallback),
}

#[derive(Default)]
struct MockState {
    opened: AtomicUsize,
    closed: AtomicUsize,
    live: Mutex<HashMap<MockStreamId, Slot>>,
    history: Mutex<Vec<(MockStreamId, Direction)>>,
    last_params: Mutex<Option<StreamParams>>,
}

#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn opened(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<StreamParams> {
        *self.state.last_params.lock()
    }

    /// Every stream ever opened in `direction`, oldest first
    pub fn streams(&self, direction: Direction) -> Vec<MockStreamId> {
        self.state
            .history
            .lock()
            .iter()
            .filter(|(_, d)| *d == direction)
            .map(|(id, _)| *id)
            .collect()
    }

    fn latest(&self, direction: Direction) -> Option<MockStreamId> {
        self.streams(direction).last().copied()
    }

    /// Run one capture callback on `stream`; false if it is not open
    pub fn tick_capture_on(&self, stream: MockStreamId, block: &[f32]) -> bool {
        match self.state.live.lock().get_mut(&stream) {
            Some(Slot::Capture(callback)) => {
                callback(block);
                true
            }
            _ => false,
        }
    }

    /// Run one playback callback on `stream`; false if it is not open
    pub fn tick_playback_on(&self, stream: MockStreamId, out: &mut [f32]) -> bool {
        match self.state.live.lock().get_mut(&stream) {
            Some(Slot::Playback(callback)) => {
                callback(out);
                true
            }
            _ => false,
        }
    }

    /// Tick the most recently opened capture stream
    pub fn tick_capture(&self, block: &[f32]) -> bool {
        self.latest(Direction::Capture)
            .map(|id| self.tick_capture_on(id, block))
            .unwrap_or(false)
    }

    /// Tick the most recently opened playback stream
    pub fn tick_playback(&self, out: &mut [f32]) -> bool {
        self.latest(Direction::Playback)
            .map(|id| self.tick_playback_on(id, out))
            .unwrap_or(false)
    }

    fn open(&self, device: &str, params: StreamParams, slot: Slot) -> Result<Box<dyn AudioStream>, AudioError> {
        if device == MISSING_DEVICE {
            return Err(AudioError::DeviceNotFound(device.to_string()));
        }
        let direction = match slot {
            Slot::Capture(_) => Direction::Capture,
            Slot::Playback(_) => Direction::Playback,
        };

        let id = MockStreamId(self.state.opened.fetch_add(1, Ordering::SeqCst));
        *self.state.last_params.lock() = Some(params);
        self.state.live.lock().insert(id, slot);
        self.state.history.lock().push((id, direction));

        Ok(Box::new(MockStream {
            id,
            device_name: device.to_string(),
            direction,
            state: self.state.clone(),
            open: true,
        }))
    }
}

impl AudioBackend for MockBackend {
    fn open_capture(
        &self,
        device: &str,
        params: StreamParams,
        callback: CaptureCallback,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        self.open(device, params, Slot::Capture(callback))
    }

    fn open_playback(
        &self,
        device: &str,
        params: StreamParams,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        self.open(device, params, Slot::Playback(callback))
    }
}

struct MockStream {
    id: MockStreamId,
    device_name: String,
    direction: Direction,
    state: Arc<MockState>,
    open: bool,
}

impl AudioStream for MockStream {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn close(&mut self) {
        if !self.open {
            return;
        }
        self.open = false;

        // Drop the callback outside the lock.
        let slot = self.state.live.lock().remove(&self.id);
        drop(slot);
        self.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.close();
    }
}
