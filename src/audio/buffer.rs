//! Lock-free bounded queue for compressed frames
//!
//! Bridges the network receive context (single producer) and the playback
//! callback (single consumer). Neither side can ever block the other: when
//! the queue is full a push evicts the oldest frame, and an empty queue
//! simply yields `None`.

use bytes::Bytes;
use crossbeam::queue::ArrayQueue;
use std::ops::Deref;
use std::sync::Arc;

/// One compressed audio packet
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    pub fn new(data: Bytes) -> Self {
        Self(data)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for Frame {
    fn from(data: Bytes) -> Self {
        Self(data)
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self(Bytes::from(data))
    }
}

impl From<&[u8]> for Frame {
    fn from(data: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(data))
    }
}

/// Fixed-capacity FIFO of frames with a drop-oldest overflow policy
///
/// Holds no counters of its own; callers count evictions from the value
/// `push` returns.
pub struct BoundedFrameQueue {
    queue: ArrayQueue<Frame>,
}

impl BoundedFrameQueue {
    /// Create a queue holding at most `capacity` frames.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "frame queue capacity must be positive");

        Self {
            queue: ArrayQueue::new(capacity),
        }
    }

    /// Append a frame, evicting the oldest one if the queue is full.
    ///
    /// Returns the evicted frame, if any.
    pub fn push(&self, frame: Frame) -> Option<Frame> {
        self.queue.force_push(frame)
    }

    /// Remove the oldest frame, or `None` if the queue is empty
    pub fn try_pop(&self) -> Option<Frame> {
        self.queue.pop()
    }

    /// Drop every queued frame, returning how many were released
    pub fn clear(&self) -> usize {
        let mut released = 0;
        while self.queue.pop().is_some() {
            released += 1;
        }
        released
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

/// Thread-safe handle to a frame queue
pub type SharedFrameQueue = Arc<BoundedFrameQueue>;

/// Create a new shared frame queue
pub fn create_shared_queue(capacity: usize) -> SharedFrameQueue {
    Arc::new(BoundedFrameQueue::new(capacity))
}
