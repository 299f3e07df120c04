//! Lock-free sample ring between the receive thread and the output callback
//!
//! Single producer (receive thread), single consumer (cpal callback). When the
//! device falls behind the oldest samples are overwritten; when the network
//! falls behind the callback plays silence. Both are counted, neither blocks.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Bounded ring of mono i16 samples
pub struct SampleRing {
    queue: ArrayQueue<i16>,
    overflow_count: AtomicU64,
    underrun_count: AtomicU64,
}

impl SampleRing {
    /// Create a new ring holding up to `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            overflow_count: AtomicU64::new(0),
            underrun_count: AtomicU64::new(0),
        }
    }

    /// Push a frame, overwriting the oldest samples if full.
    /// Returns the number of samples that were overwritten.
    pub fn push_frame(&self, samples: &[i16]) -> usize {
        let mut overwritten = 0;
        for &sample in samples {
            if self.queue.force_push(sample).is_some() {
                overwritten += 1;
            }
        }
        if overwritten > 0 {
            self.overflow_count.fetch_add(1, Ordering::Relaxed);
        }
        overwritten
    }

    /// Pop one sample
    pub fn pop(&self) -> Option<i16> {
        self.queue.pop()
    }

    /// Record that a callback ran dry
    pub fn note_underrun(&self) {
        self.underrun_count.fetch_add(1, Ordering::Relaxed);
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

    /// Frames that overwrote unplayed samples
    pub fn overflow_count(&self) -> u64 {
        self.overflow_count.load(Ordering::Relaxed)
    }

    /// Output callbacks that ran out of samples
    pub fn underrun_count(&self) -> u64 {
        self.underrun_count.load(Ordering::Relaxed)
    }

    pub fn fill_level(&self) -> f32 {
        self.len() as f32 / self.capacity() as f32
    }
}

/// Thread-safe handle to a sample ring
pub type SharedSampleRing = Arc<SampleRing>;
