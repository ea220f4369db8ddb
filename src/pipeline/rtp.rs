//! L24 RTP multicast transport pipeline
//!
//! The shipped [`PipelineEngine`]: per stream, a worker thread pulls
//! interleaved f32 blocks from an audio source, packs them into L24
//! (24-bit big-endian) RTP packets timestamped in sample-clock units
//! seeded from the pipeline's start epoch, and transmits them over UDP
//! multicast with a bounded hop count. There is no retransmission and no
//! buffering beyond the capture frame queue: backpressure drops audio.

use bytes::{BufMut, Bytes, BytesMut};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::source::{AudioSource, CaptureSource, SilenceSource};
use crate::clock::service::{ClockHandle, ClockTime};
use crate::constants::{EVENT_CHANNEL_CAPACITY, MAX_PACKET_SIZE, PACKET_TIME_US};
use crate::error::{AudioError, PipelineError};
use crate::pipeline::engine::{
    PipelineEngine, PipelineEvent, PipelineHandle, PipelineSpec, PipelineState,
};

const RTP_HEADER_SIZE: usize = 12;
const RTP_VERSION: u8 = 2;

/// Builds [`RtpPipeline`]s
pub struct RtpEngine;

impl RtpEngine {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RtpEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineEngine for RtpEngine {
    fn build(&self, spec: &PipelineSpec) -> Result<Box<dyn PipelineHandle>, PipelineError> {
        let samples_per_packet = samples_per_packet(spec.sample_rate);
        let packet_size =
            RTP_HEADER_SIZE + samples_per_packet * spec.channels as usize * 3;
        if packet_size > MAX_PACKET_SIZE {
            return Err(PipelineError::Build {
                index: spec.index,
                reason: format!(
                    "{} channels at {} Hz need {packet_size}-byte packets (max {MAX_PACKET_SIZE})",
                    spec.channels, spec.sample_rate
                ),
            });
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Box::new(RtpPipeline {
            spec: spec.clone(),
            clock: None,
            epoch: None,
            state: PipelineState::Built,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            events_tx,
            events_rx: Some(events_rx),
        }))
    }
}

/// One stream's transport pipeline
pub struct RtpPipeline {
    spec: PipelineSpec,
    clock: Option<ClockHandle>,
    epoch: Option<ClockTime>,
    state: PipelineState,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    events_tx: mpsc::Sender<PipelineEvent>,
    events_rx: Option<mpsc::Receiver<PipelineEvent>>,
}

impl RtpPipeline {
    fn transition(&mut self, to: PipelineState) {
        let from = self.state;
        self.state = to;
        // try_send: state changes are advisory and must not block the
        // control path
        let _ = self.events_tx.try_send(PipelineEvent::StateChanged { from, to });
    }

    fn open_socket(&self) -> Result<UdpSocket, PipelineError> {
        let start_err = |reason: String| PipelineError::Start {
            index: self.spec.index,
            reason,
        };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(|e| start_err(format!("socket creation failed: {e}")))?;
        socket
            .set_multicast_ttl_v4(self.spec.ttl)
            .map_err(|e| start_err(format!("setting multicast TTL failed: {e}")))?;
        Ok(socket.into())
    }

    /// Open the named source endpoint, or fall back to silence when it
    /// does not exist yet. An unpatched source carries silence rather
    /// than holding back the rest of the advertised streams.
    fn open_source(&self) -> Result<Box<dyn AudioSource>, PipelineError> {
        match CaptureSource::new(
            &self.spec.source_name,
            self.spec.channels,
            self.spec.sample_rate,
        ) {
            Ok(source) => Ok(Box::new(source)),
            Err(AudioError::DeviceNotFound(name)) => {
                warn!(
                    "Stream {}: no input device matches \"{}\", transmitting silence",
                    self.spec.index, name
                );
                let _ = self.events_tx.try_send(PipelineEvent::Warning {
                    message: format!("no input device matches \"{name}\""),
                    diagnostic: Some("transmitting silence until the source appears".into()),
                });
                Ok(Box::new(SilenceSource::new(
                    self.spec.channels,
                    self.spec.sample_rate,
                )))
            }
            Err(e) => Err(PipelineError::Start {
                index: self.spec.index,
                reason: format!("audio source unavailable: {e}"),
            }),
        }
    }
}

impl PipelineHandle for RtpPipeline {
    fn set_clock(&mut self, clock: ClockHandle) {
        self.clock = Some(clock);
    }

    fn set_start_epoch(&mut self, epoch: ClockTime) {
        self.epoch = Some(epoch);
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Running => return Ok(()),
            PipelineState::Stopped => {
                return Err(PipelineError::Start {
                    index: self.spec.index,
                    reason: "pipeline is stopped and cannot be restarted".into(),
                })
            }
            PipelineState::Built => {}
        }

        // The time base must be bound before any data flows
        let epoch = match (&self.clock, self.epoch) {
            (Some(_), Some(epoch)) => epoch,
            _ => {
                return Err(PipelineError::Start {
                    index: self.spec.index,
                    reason: "clock not bound before start".into(),
                })
            }
        };

        let socket = self.open_socket()?;
        let source = self.open_source()?;
        check_source_format(source.as_ref(), &self.spec)?;

        let packetizer = Packetizer::new(
            self.spec.payload_type,
            self.spec.channels,
            samples_per_packet(self.spec.sample_rate),
            stream_ssrc(&self.spec),
            epoch_to_rtp_timestamp(epoch, self.spec.sample_rate),
        );

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let events = self.events_tx.clone();
        let destination = SocketAddr::V4(self.spec.destination);
        let index = self.spec.index;

        let worker = thread::Builder::new()
            .name(format!("rtp-stream-{index}"))
            .spawn(move || {
                transmit_loop(source, packetizer, socket, destination, running, events, index)
            })
            .map_err(|e| PipelineError::Start {
                index,
                reason: format!("failed to spawn worker thread: {e}"),
            })?;

        self.worker = Some(worker);
        self.transition(PipelineState::Running);
        debug!(
            "Stream {index} transmitting to {} ({} channels)",
            self.spec.destination, self.spec.channels
        );
        Ok(())
    }

    fn stop(&mut self) {
        match self.state {
            PipelineState::Stopped => return,
            PipelineState::Built => {
                self.transition(PipelineState::Stopped);
                return;
            }
            PipelineState::Running => {}
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.transition(PipelineState::Stopped);
    }

    fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>> {
        self.events_rx.take()
    }

    fn state(&self) -> PipelineState {
        self.state
    }
}

impl Drop for RtpPipeline {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker loop: pull blocks, packetize, transmit
fn transmit_loop(
    mut source: Box<dyn AudioSource>,
    mut packetizer: Packetizer,
    socket: UdpSocket,
    destination: SocketAddr,
    running: Arc<AtomicBool>,
    events: mpsc::Sender<PipelineEvent>,
    index: usize,
) {
    let mut packets: Vec<Bytes> = Vec::with_capacity(16);
    let mut reported_drops = 0usize;

    while running.load(Ordering::Relaxed) {
        match source.next_block() {
            Ok(Some(block)) => {
                // Empty block: the source's bounded wait expired with no
                // data; loop around and re-check the running flag
                if block.samples.is_empty() {
                    continue;
                }
                packetizer.push(&block.samples, &mut packets);
                for packet in packets.drain(..) {
                    if let Err(e) = socket.send_to(&packet, destination) {
                        // Terminal events must not be lost
                        let _ = events.blocking_send(PipelineEvent::Error {
                            message: format!("transmit to {destination} failed: {e}"),
                            diagnostic: None,
                        });
                        return;
                    }
                }

                let drops = source.dropped_blocks();
                if drops > reported_drops {
                    let _ = events.try_send(PipelineEvent::Warning {
                        message: format!("dropped {} blocks under backpressure", drops - reported_drops),
                        diagnostic: None,
                    });
                    reported_drops = drops;
                }
            }
            Ok(None) => {
                debug!("Stream {index}: source ended");
                let _ = events.blocking_send(PipelineEvent::EndOfStream);
                return;
            }
            Err(e) => {
                let _ = events.blocking_send(PipelineEvent::Error {
                    message: format!("audio source failed: {e}"),
                    diagnostic: None,
                });
                return;
            }
        }
    }
}

/// The packetizer assumes the source delivers exactly the stream's
/// format; a mismatched source would mislabel every packet
fn check_source_format(
    source: &dyn AudioSource,
    spec: &PipelineSpec,
) -> Result<(), PipelineError> {
    if source.channels() != spec.channels || source.sample_rate() != spec.sample_rate {
        return Err(PipelineError::Start {
            index: spec.index,
            reason: format!(
                "source delivers {} channels at {} Hz, stream expects {} at {}",
                source.channels(),
                source.sample_rate(),
                spec.channels,
                spec.sample_rate
            ),
        });
    }
    Ok(())
}

/// Samples per channel in one packet
fn samples_per_packet(sample_rate: u32) -> usize {
    ((sample_rate as u64 * PACKET_TIME_US) / 1_000_000).max(1) as usize
}

/// Map a clock epoch in nanoseconds to an RTP timestamp in sample-clock
/// units (truncated to 32 bits, as RTP timestamps wrap)
fn epoch_to_rtp_timestamp(epoch_ns: ClockTime, sample_rate: u32) -> u32 {
    ((epoch_ns as u128 * sample_rate as u128) / 1_000_000_000) as u32
}

/// Deterministic SSRC so streams stay identifiable across restarts
fn stream_ssrc(spec: &PipelineSpec) -> u32 {
    ((spec.destination.port() as u32) << 16) | (spec.index as u32 & 0xFFFF)
}

/// Accumulates interleaved f32 samples and emits fixed-size L24 RTP
/// packets
struct Packetizer {
    payload_type: u8,
    channels: u16,
    samples_per_packet: usize,
    sequence: u16,
    timestamp: u32,
    ssrc: u32,
    pending: Vec<f32>,
}

impl Packetizer {
    fn new(
        payload_type: u8,
        channels: u16,
        samples_per_packet: usize,
        ssrc: u32,
        initial_timestamp: u32,
    ) -> Self {
        Self {
            payload_type,
            channels,
            samples_per_packet,
            sequence: 0,
            timestamp: initial_timestamp,
            ssrc,
            pending: Vec::with_capacity(samples_per_packet * channels as usize * 2),
        }
    }

    /// Feed interleaved samples; completed packets are appended to `out`
    fn push(&mut self, samples: &[f32], out: &mut Vec<Bytes>) {
        self.pending.extend_from_slice(samples);

        let packet_samples = self.samples_per_packet * self.channels as usize;
        while self.pending.len() >= packet_samples {
            let frame: Vec<f32> = self.pending.drain(..packet_samples).collect();
            out.push(self.build_packet(&frame));
        }
    }

    fn build_packet(&mut self, samples: &[f32]) -> Bytes {
        let mut buf = BytesMut::with_capacity(RTP_HEADER_SIZE + samples.len() * 3);

        buf.put_u8(RTP_VERSION << 6);
        buf.put_u8(self.payload_type & 0x7F);
        buf.put_u16(self.sequence);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
        for &sample in samples {
            let value = encode_l24(sample);
            buf.put_u8((value >> 16) as u8);
            buf.put_u8((value >> 8) as u8);
            buf.put_u8(value as u8);
        }

        self.sequence = self.sequence.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(self.samples_per_packet as u32);
        buf.freeze()
    }
}

/// Clamp and scale one f32 sample to signed 24-bit
fn encode_l24(sample: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * 8_388_607.0) as i32
}
