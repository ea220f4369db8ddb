//! Pipeline engine boundary
//!
//! A [`PipelineEngine`] builds transport pipelines; a [`PipelineHandle`]
//! is one built instance. The orchestration core only ever talks to these
//! traits, so the shipped RTP engine and the scripted test engines are
//! interchangeable.

use std::net::SocketAddrV4;

use tokio::sync::mpsc;

use crate::clock::service::{ClockHandle, ClockTime};
use crate::error::PipelineError;

/// Everything an engine needs to build one stream's pipeline
#[derive(Debug, Clone)]
pub struct PipelineSpec {
    /// Stream ordinal, 0-based
    pub index: usize,
    /// Name of the local audio source endpoint to read from
    pub source_name: String,
    /// Channels carried by this stream
    pub channels: u16,
    /// 1-indexed first source channel of this stream
    pub start_channel: u32,
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Multicast group and port to transmit to
    pub destination: SocketAddrV4,
    /// Multicast hop limit
    pub ttl: u32,
    /// RTP payload type
    pub payload_type: u8,
}

/// Pipeline lifecycle states
///
/// Strictly `Built → Running → Stopped`; a stopped pipeline must be
/// rebuilt, not resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Built,
    Running,
    Stopped,
}

/// Events emitted by a running pipeline
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Unrecoverable pipeline failure; brings the whole system down
    Error {
        message: String,
        diagnostic: Option<String>,
    },
    /// The source finished; expected termination
    EndOfStream,
    /// Logged by the orchestrator, never escalated
    Warning {
        message: String,
        diagnostic: Option<String>,
    },
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
}

/// One built pipeline instance
pub trait PipelineHandle: Send {
    /// Bind the pipeline's time base. Must happen before [`start`]:
    /// binding the clock after streaming begins would produce timestamp
    /// discontinuities.
    ///
    /// [`start`]: PipelineHandle::start
    fn set_clock(&mut self, clock: ClockHandle);

    /// Set the clock reading used as the timestamp origin for outgoing
    /// packets. Must happen before [`start`].
    ///
    /// [`start`]: PipelineHandle::start
    fn set_start_epoch(&mut self, epoch: ClockTime);

    /// Transition to actively running
    fn start(&mut self) -> Result<(), PipelineError>;

    /// Transition to fully stopped and release transport resources.
    /// Idempotent; a no-op on a never-started or already-stopped
    /// pipeline.
    fn stop(&mut self);

    /// Take the pipeline's event stream. Yields `Some` exactly once.
    fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>>;

    /// Current lifecycle state
    fn state(&self) -> PipelineState;
}

/// Builds pipelines from specs
pub trait PipelineEngine: Send + Sync {
    fn build(&self, spec: &PipelineSpec) -> Result<Box<dyn PipelineHandle>, PipelineError>;
}
