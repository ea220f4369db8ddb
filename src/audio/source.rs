//! Audio sources
//!
//! A pipeline pulls interleaved f32 blocks from an [`AudioSource`].
//! [`CaptureSource`] wraps a cpal input stream running on its own
//! dedicated thread; [`SilenceSource`] generates zeroed blocks at real
//! time and stands in when the named source endpoint does not exist yet,
//! the same way an unpatched audio client carries silence.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use crossbeam_channel::{bounded, Receiver};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::buffer::{create_shared_queue, AudioBlock, SharedFrameQueue};
use crate::constants::FRAME_QUEUE_CAPACITY;
use crate::error::AudioError;

/// Poll interval while waiting for the next captured block
const POLL_INTERVAL: Duration = Duration::from_micros(500);

/// Longest a single `next_block` call may park the caller
const MAX_BLOCK_WAIT: Duration = Duration::from_millis(100);

/// Source of interleaved f32 audio blocks
pub trait AudioSource: Send {
    /// Pull the next block, waiting a bounded time for data. An empty
    /// block means nothing arrived within the wait; callers use it to
    /// re-check their own stop conditions. `Ok(None)` signals end of
    /// stream.
    fn next_block(&mut self) -> Result<Option<AudioBlock>, AudioError>;

    /// Number of interleaved channels per block
    fn channels(&self) -> u16;

    /// Sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Blocks dropped at the source boundary due to backpressure
    fn dropped_blocks(&self) -> usize {
        0
    }
}

/// Capture from a local input device via cpal
///
/// The cpal stream lives on a dedicated named thread (streams are not
/// `Send`); captured blocks cross to the consumer through a lock-free
/// frame queue with drop-on-backpressure.
pub struct CaptureSource {
    channels: u16,
    sample_rate: u32,
    running: Arc<AtomicBool>,
    queue: SharedFrameQueue,
    error_rx: Receiver<AudioError>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CaptureSource {
    /// Open the input device whose name matches `source_name` and start
    /// capturing at the requested rate and channel count.
    pub fn new(source_name: &str, channels: u16, sample_rate: u32) -> Result<Self, AudioError> {
        let device = find_input_device(source_name)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "<unknown>".to_string());

        let config = StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let queue = create_shared_queue(FRAME_QUEUE_CAPACITY);
        let running = Arc::new(AtomicBool::new(true));
        let (error_tx, error_rx) = bounded::<AudioError>(16);
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_queue = queue.clone();
        let thread_running = running.clone();
        let loop_running = running.clone();

        let handle = thread::Builder::new()
            .name(format!("capture-{source_name}"))
            .spawn(move || {
                let stream = device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !thread_running.load(Ordering::Relaxed) {
                            return;
                        }
                        // Drop on overflow; the queue keeps the count
                        let _ = thread_queue.push(AudioBlock::new(data.to_vec(), channels));
                    },
                    move |err| {
                        let _ = error_tx.try_send(AudioError::StreamError(err.to_string()));
                    },
                    None,
                );

                match stream {
                    Ok(stream) => {
                        if let Err(e) = stream.play() {
                            let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                            return;
                        }
                        let _ = ready_tx.send(Ok(()));
                        while loop_running.load(Ordering::Relaxed) {
                            thread::sleep(Duration::from_millis(10));
                        }
                        // Stream drops here, stopping capture
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(AudioError::StreamError(e.to_string())));
                    }
                }
            })
            .map_err(|e| AudioError::StreamError(e.to_string()))?;

        // Surface stream build/play failures as construction errors
        match ready_rx.recv_timeout(Duration::from_secs(5)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                return Err(AudioError::StreamError(format!(
                    "capture thread for {device_name} did not report readiness"
                )));
            }
        }

        tracing::debug!("Capturing from input device \"{}\"", device_name);

        Ok(Self {
            channels,
            sample_rate,
            running,
            queue,
            error_rx,
            thread_handle: Some(handle),
        })
    }
}

impl AudioSource for CaptureSource {
    fn next_block(&mut self) -> Result<Option<AudioBlock>, AudioError> {
        let deadline = Instant::now() + MAX_BLOCK_WAIT;
        loop {
            if let Some(block) = self.queue.pop() {
                return Ok(Some(block));
            }
            if let Ok(err) = self.error_rx.try_recv() {
                return Err(err);
            }
            if !self.running.load(Ordering::Relaxed) {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                // A silently stalled device must not pin the caller here
                return Ok(Some(AudioBlock::new(Vec::new(), self.channels)));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn dropped_blocks(&self) -> usize {
        self.queue.dropped()
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Find an input device whose name matches `source_name`
/// (case-insensitive substring match in either direction)
fn find_input_device(source_name: &str) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    let wanted = source_name.to_lowercase();

    let devices = host
        .input_devices()
        .map_err(|e| AudioError::DeviceNotFound(e.to_string()))?;

    for device in devices {
        if let Ok(name) = device.name() {
            let name_lc = name.to_lowercase();
            if name_lc.contains(&wanted) || wanted.contains(&name_lc) {
                return Ok(device);
            }
        }
    }

    Err(AudioError::DeviceNotFound(source_name.to_string()))
}

/// Generates zeroed blocks at real-time rate
///
/// Paces itself against a monotonic deadline so the downstream packetizer
/// sees the same cadence as a live capture.
pub struct SilenceSource {
    channels: u16,
    sample_rate: u32,
    frames_per_block: usize,
    next_due: Instant,
    block_duration: Duration,
}

impl SilenceSource {
    pub fn new(channels: u16, sample_rate: u32) -> Self {
        // 10 ms blocks; the packetizer re-chunks to packet time
        let frames_per_block = (sample_rate as usize / 100).max(1);
        let block_duration =
            Duration::from_nanos(frames_per_block as u64 * 1_000_000_000 / sample_rate as u64);
        Self {
            channels,
            sample_rate,
            frames_per_block,
            next_due: Instant::now(),
            block_duration,
        }
    }
}

impl AudioSource for SilenceSource {
    fn next_block(&mut self) -> Result<Option<AudioBlock>, AudioError> {
        let now = Instant::now();
        if self.next_due > now {
            thread::sleep(self.next_due - now);
        }
        self.next_due += self.block_duration;

        let samples = vec![0.0f32; self.frames_per_block * self.channels as usize];
        Ok(Some(AudioBlock::new(samples, self.channels)))
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
