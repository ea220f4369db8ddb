//! Lock-free frame queue between capture callbacks and packetizers
//!
//! Single-producer single-consumer, sized for a few hundred milliseconds
//! of audio. Real-time audio cannot buffer indefinitely: when the
//! packetizer falls behind, the oldest pressure shows up here and new
//! blocks are dropped rather than queued (drop-on-backpressure, no
//! retransmission anywhere in the path).

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One block of interleaved f32 samples as delivered by the source
#[derive(Clone)]
pub struct AudioBlock {
    /// Interleaved samples, `channels` values per frame
    pub samples: Vec<f32>,
    /// Number of channels
    pub channels: u16,
}

impl AudioBlock {
    pub fn new(samples: Vec<f32>, channels: u16) -> Self {
        Self { samples, channels }
    }

    /// Number of sample frames (samples per channel) in this block
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }
}

/// Lock-free SPSC queue of audio blocks with drop accounting
pub struct FrameQueue {
    queue: ArrayQueue<AudioBlock>,
    dropped: AtomicUsize,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity),
            dropped: AtomicUsize::new(0),
        }
    }

    /// Push a block; on a full queue the block is dropped and counted
    pub fn push(&self, block: AudioBlock) -> bool {
        match self.queue.push(block) {
            Ok(()) => true,
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Pop the next block, if any
    pub fn pop(&self) -> Option<AudioBlock> {
        self.queue.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Blocks dropped due to backpressure since creation
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to a frame queue
pub type SharedFrameQueue = Arc<FrameQueue>;

/// Create a new shared frame queue
pub fn create_shared_queue(capacity: usize) -> SharedFrameQueue {
    Arc::new(FrameQueue::new(capacity))
}
