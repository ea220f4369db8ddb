//! # AES67 Sender
//!
//! PTP-synchronized multi-stream AES67 multicast audio sender.
//!
//! A source host with a large channel count fans audio out to multiple
//! receivers as independent multicast RTP streams, each carrying a
//! contiguous sub-range of channels. All streams share one network clock
//! so that receivers can align them sample-accurately.
//!
//! ## Architecture Overview
//!
//! ```text
//!  Configuration (JSON)
//!        │
//!        ▼
//!  ┌──────────────────┐     ┌───────────────────────┐
//!  │ Channel          │     │ Clock Synchronization │
//!  │ Partitioner      │     │ Coordinator           │
//!  │ (streams)        │     │ (clock)               │
//!  └───────┬──────────┘     └──────────┬────────────┘
//!          │ StreamDescriptors         │ ClockHandle (shared)
//!          ▼                           ▼
//!  ┌─────────────────────────────────────────────────┐
//!  │                 Orchestrator                    │
//!  │   build → bind clock → set epoch → start        │
//!  └──┬───────────────┬───────────────┬──────────────┘
//!     ▼               ▼               ▼
//!  ┌────────┐     ┌────────┐      ┌────────┐
//!  │ Stream │     │ Stream │      │ Stream │   one supervisor +
//!  │ Superv.│     │ Superv.│ ...  │ Superv.│   RTP pipeline per
//!  │   0    │     │   1    │      │  N-1   │   channel sub-range
//!  └───┬────┘     └───┬────┘      └───┬────┘
//!      │ L24/RTP      │               │
//!      ▼              ▼               ▼
//!   239.x.x.a      239.x.x.a+1     239.x.x.a+N-1      (UDP multicast)
//! ```
//!
//! Any single pipeline failure, end-of-stream, or termination signal
//! triggers one coordinated shutdown of every stream followed by clock
//! release. Partial-stream operation is never allowed: receivers expect
//! all advertised streams to be live.

pub mod audio;
pub mod clock;
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod streams;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    use std::time::Duration;

    /// RTP payload type for L24 audio (dynamic range, matches AES67 SDP)
    pub const RTP_PAYLOAD_TYPE: u8 = 96;

    /// Multicast hop limit for outgoing RTP packets
    pub const MULTICAST_TTL: u32 = 32;

    /// Packet time: one packet per millisecond of audio
    pub const PACKET_TIME_US: u64 = 1000;

    /// Maximum UDP payload size (MTU minus IP/UDP headers)
    pub const MAX_PACKET_SIZE: usize = 1472;

    /// How long to wait for the network clock to sync with a grandmaster
    /// before continuing on best-effort local time
    pub const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

    /// Lock-free frame queue capacity between capture and packetizer (in blocks)
    pub const FRAME_QUEUE_CAPACITY: usize = 256;

    /// Pipeline event channel depth per stream
    pub const EVENT_CHANNEL_CAPACITY: usize = 32;
}
