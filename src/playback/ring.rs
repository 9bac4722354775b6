//! Lock-free sample ring between the decode worker and the output
//! callback.
//!
//! Single producer (decoder), single consumer (real-time callback).
//! Counted in f32 samples; both sides only ever move whole frames, the
//! producer whole periods, so frame alignment is preserved by
//! construction. The buffer is written end to end once at creation so
//! the real-time side never takes a first-touch page fault.

use crate::audio::{OUTPUT_CHANNELS, OUTPUT_SAMPLE_RATE};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use tracing::debug;

pub struct AudioRing {
    rb: HeapRb<f32>,
}

impl AudioRing {
    /// A ring holding `seconds` of output audio.
    pub fn with_seconds(seconds: usize) -> Self {
        let capacity = seconds * OUTPUT_SAMPLE_RATE as usize * OUTPUT_CHANNELS;
        debug!("creating audio ring: {capacity} samples ({seconds}s)");
        Self {
            rb: HeapRb::new(capacity),
        }
    }

    /// Split into the producer and consumer halves, pre-touching the
    /// backing memory on the way.
    pub fn split(self) -> (RingProducer, RingConsumer) {
        let capacity: usize = self.rb.capacity().into();
        let (mut prod, mut cons) = self.rb.split();

        let zeros = vec![0.0f32; capacity];
        let pushed = prod.push_slice(&zeros);
        let mut drain = vec![0.0f32; capacity];
        let popped = cons.pop_slice(&mut drain);
        debug_assert_eq!(pushed, popped);

        (RingProducer { inner: prod }, RingConsumer { inner: cons })
    }
}

/// Producer half, owned by the decode worker.
pub struct RingProducer {
    inner: HeapProd<f32>,
}

impl RingProducer {
    /// Free space in samples.
    pub fn free(&self) -> usize {
        self.inner.vacant_len()
    }

    /// Write samples; returns how many were accepted.
    pub fn write(&mut self, samples: &[f32]) -> usize {
        self.inner.push_slice(samples)
    }
}

/// Consumer half, owned by the output callback.
pub struct RingConsumer {
    inner: HeapCons<f32>,
}

impl RingConsumer {
    /// Readable samples.
    pub fn available(&self) -> usize {
        self.inner.occupied_len()
    }

    /// Read into `out`; returns how many samples were copied.
    pub fn read(&mut self, out: &mut [f32]) -> usize {
        self.inner.pop_slice(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_come_out_in_order() {
        let (mut prod, mut cons) = AudioRing::with_seconds(1).split();

        let input: Vec<f32> = (0..8).map(|i| i as f32).collect();
        assert_eq!(prod.write(&input), 8);
        assert_eq!(cons.available(), 8);

        let mut out = vec![0.0; 8];
        assert_eq!(cons.read(&mut out), 8);
        assert_eq!(out, input);
        assert_eq!(cons.available(), 0);
    }

    #[test]
    fn capacity_matches_seconds() {
        let (prod, _cons) = AudioRing::with_seconds(4).split();
        assert_eq!(prod.free(), 4 * 48_000 * 2);
    }

    #[test]
    fn short_write_when_full() {
        let rb = AudioRing {
            rb: HeapRb::new(4),
        };
        let (mut prod, _cons) = rb.split();
        let input = [1.0f32; 6];
        assert_eq!(prod.write(&input), 4);
    }
}
