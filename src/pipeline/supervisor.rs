//! Stream pipeline supervisor
//!
//! Drives one stream's pipeline on behalf of the orchestrator: builds it
//! from a descriptor, binds the shared clock and start epoch in the
//! mandatory order, starts it, hands its event stream upward, and stops
//! it during the shutdown cascade.

use tokio::sync::mpsc;
use tracing::debug;

use crate::clock::service::ClockHandle;
use crate::constants::{MULTICAST_TTL, RTP_PAYLOAD_TYPE};
use crate::error::PipelineError;
use crate::pipeline::engine::{
    PipelineEngine, PipelineEvent, PipelineHandle, PipelineSpec, PipelineState,
};
use crate::streams::StreamDescriptor;
use std::net::SocketAddrV4;

/// Supervises one pipeline instance
pub struct StreamSupervisor {
    index: usize,
    handle: Box<dyn PipelineHandle>,
}

impl StreamSupervisor {
    /// Build the pipeline for `descriptor` and bind it to the shared
    /// clock.
    ///
    /// The clock is bound and the start epoch captured before the
    /// pipeline can start; binding the clock after streaming begins
    /// would produce timestamp discontinuities.
    pub fn build(
        engine: &dyn PipelineEngine,
        descriptor: &StreamDescriptor,
        clock: &ClockHandle,
        client_name_prefix: &str,
        sample_rate: u32,
    ) -> Result<Self, PipelineError> {
        let channels =
            u16::try_from(descriptor.channel_count).map_err(|_| PipelineError::Build {
                index: descriptor.index,
                reason: format!("{} channels exceed the per-stream limit", descriptor.channel_count),
            })?;

        let spec = PipelineSpec {
            index: descriptor.index,
            source_name: format!("{client_name_prefix}_stream{}", descriptor.index),
            channels,
            start_channel: descriptor.start_channel,
            sample_rate,
            destination: SocketAddrV4::new(descriptor.multicast_address, descriptor.port),
            ttl: MULTICAST_TTL,
            payload_type: RTP_PAYLOAD_TYPE,
        };

        debug!(
            "Building pipeline for stream {}: {} channels (from {}) -> {}",
            spec.index, spec.channels, spec.start_channel, spec.destination
        );

        let mut handle = engine.build(&spec)?;
        handle.set_clock(clock.clone());
        handle.set_start_epoch(clock.now());

        Ok(Self {
            index: descriptor.index,
            handle,
        })
    }

    /// Transition the pipeline to actively running
    pub fn start(&mut self) -> Result<(), PipelineError> {
        self.handle.start()
    }

    /// Take the pipeline's event stream; yields `Some` exactly once
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<PipelineEvent>> {
        self.handle.take_events()
    }

    /// Stop the pipeline and release its transport resources.
    /// Idempotent and infallible: failures inside the pipeline's own
    /// teardown are logged there, never raised, so stopping one stream
    /// can never block stopping the rest.
    pub fn stop(&mut self) {
        self.handle.stop();
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn state(&self) -> PipelineState {
        self.handle.state()
    }
}
