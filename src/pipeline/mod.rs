//! Stream pipeline subsystem
//!
//! One pipeline per stream descriptor: reads a channel sub-range from a
//! local audio source, packetizes it as L24 RTP timestamped against the
//! shared network clock, and transmits it to the stream's multicast
//! group. [`engine`] defines the pipeline boundary, [`rtp`] is the
//! shipped transport implementation, and [`supervisor`] drives one
//! pipeline's lifecycle on behalf of the orchestrator.

pub mod engine;
pub mod rtp;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod mock;

pub use engine::{PipelineEngine, PipelineEvent, PipelineHandle, PipelineSpec, PipelineState};
pub use rtp::RtpEngine;
pub use supervisor::StreamSupervisor;
