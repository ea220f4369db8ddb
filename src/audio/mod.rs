//! Audio sources feeding the RTP pipelines

pub mod buffer;
pub mod source;

pub use buffer::{AudioBlock, FrameQueue, SharedFrameQueue};
pub use source::{AudioSource, CaptureSource, SilenceSource};
