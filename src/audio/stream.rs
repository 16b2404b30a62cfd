//! cpal-backed device streams
//!
//! Each stream lives on its own dedicated thread: the thread builds the cpal
//! stream, plays it, and keeps it alive until the handle is closed. This keeps
//! the handle `Send` on hosts where `cpal::Stream` is not, and gives `close`
//! a join point after which the device callback is guaranteed to be gone.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::blocks::{CaptureBlocker, PlaybackBlocker};
use super::device::find_device;
use super::{AudioBackend, AudioStream, CaptureCallback, Direction, PlaybackCallback, StreamParams};
use crate::error::AudioError;

/// How often the stream thread checks whether it should shut down
const KEEPALIVE_POLL: Duration = Duration::from_millis(10);

/// Backend using the default cpal host
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn open_capture(
        &self,
        device: &str,
        params: StreamParams,
        callback: CaptureCallback,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        let stream = CpalStream::open(device, params, StreamCallback::Capture(callback))?;
        Ok(Box::new(stream))
    }

    fn open_playback(
        &self,
        device: &str,
        params: StreamParams,
        callback: PlaybackCallback,
    ) -> Result<Box<dyn AudioStream>, AudioError> {
        let stream = CpalStream::open(device, params, StreamCallback::Playback(callback))?;
        Ok(Box::new(stream))
    }
}

enum StreamCallback {
    Capture(CaptureCallback),
    Playback(PlaybackCallback),
}

impl StreamCallback {
    fn direction(&self) -> Direction {
        match self {
            StreamCallback::Capture(_) => Direction::Capture,
            StreamCallback::Playback(_) => Direction::Playback,
        }
    }
}

/// A running cpal stream on its own thread
pub struct CpalStream {
    device_name: String,
    direction: Direction,

    /// Whether the stream thread should keep the stream alive
    running: Arc<AtomicBool>,

    /// Stream thread handle
    thread_handle: Option<JoinHandle<()>>,

    /// Channel for asynchronous stream errors
    error_rx: Receiver<AudioError>,
}

impl CpalStream {
    fn open(device_name: &str, params: StreamParams, callback: StreamCallback) -> Result<Self, AudioError> {
        let direction = callback.direction();
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);
        let (error_tx, error_rx) = bounded::<AudioError>(16);

        let thread_running = running.clone();
        let thread_device = device_name.to_string();

        let handle = thread::Builder::new()
            .name(format!("{}-{}", direction, if device_name.is_empty() { "default" } else { device_name }))
            .spawn(move || {
                run_stream(thread_device, params, callback, thread_running, ready_tx, error_tx)
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        let ready = ready_rx
            .recv()
            .unwrap_or_else(|_| Err(AudioError::StreamError("stream thread exited early".into())));

        if let Err(e) = ready {
            running.store(false, Ordering::SeqCst);
            let _ = handle.join();
            return Err(e);
        }

        tracing::info!("Opened {} stream on '{}'", direction, display_name(device_name));

        Ok(Self {
            device_name: device_name.to_string(),
            direction,
            running,
            thread_handle: Some(handle),
            error_rx,
        })
    }

    /// Next asynchronous error reported by the host, if any
    pub fn check_errors(&self) -> Option<AudioError> {
        self.error_rx.try_recv().ok()
    }
}

impl AudioStream for CpalStream {
    fn device_name(&self) -> &str {
        &self.device_name
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
            while let Some(e) = self.check_errors() {
                tracing::debug!("Unreported {} stream error: {}", self.direction, e);
            }
            tracing::info!("Closed {} stream on '{}'", self.direction, display_name(&self.device_name));
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.close();
    }
}

fn display_name(name: &str) -> &str {
    if name.is_empty() {
        "default"
    } else {
        name
    }
}

fn run_stream(
    device_name: String,
    params: StreamParams,
    callback: StreamCallback,
    running: Arc<AtomicBool>,
    ready_tx: Sender<Result<(), AudioError>>,
    error_tx: Sender<AudioError>,
) {
    let stream = match build_stream(&device_name, params, callback, error_tx) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
        return;
    }
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::Relaxed) {
        thread::sleep(KEEPALIVE_POLL);
    }

    let _ = stream.pause();
    // Dropping the stream here stops the device and drops the callback.
}

fn build_stream(
    device_name: &str,
    params: StreamParams,
    callback: StreamCallback,
    error_tx: Sender<AudioError>,
) -> Result<cpal::Stream, AudioError> {
    let direction = callback.direction();
    let device = find_device(direction, device_name)?;

    // The blockers absorb whatever buffer length the host picks.
    let config = StreamConfig {
        channels: params.channels,
        sample_rate: SampleRate(params.sample_rate),
        buffer_size: BufferSize::Default,
    };

    let on_error = move |err: cpal::StreamError| {
        tracing::warn!("{} stream error: {}", direction, err);
        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
    };

    let stream = match callback {
        StreamCallback::Capture(mut callback) => {
            let mut blocker = CaptureBlocker::new(params.block_len);
            device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    blocker.push(data, |block| callback(block));
                },
                on_error,
                None,
            )
        }
        StreamCallback::Playback(mut callback) => {
            let mut blocker = PlaybackBlocker::new(params.block_len);
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    blocker.fill(data, |block| callback(block));
                },
                on_error,
                None,
            )
        }
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::StreamConfigNotSupported => AudioError::UnsupportedFormat(format!(
            "{} Hz, {} channel(s), f32 on '{}'",
            params.sample_rate,
            params.channels,
            display_name(device_name)
        )),
        other => AudioError::StreamError(other.to_string()),
    })
}
