//! Entropy source for playlist shuffling.
//!
//! Kernel entropy when available, falling back to a time-seeded PRNG.
//! The audio path never touches this; it only decides track order.

use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Uniform u32 source backed by the OS, with a PRNG fallback.
pub struct ShuffleRng {
    fallback: Option<StdRng>,
}

impl ShuffleRng {
    pub fn new() -> Self {
        Self { fallback: None }
    }

    /// One uniform 32-bit integer.
    pub fn next_u32(&mut self) -> u32 {
        if let Some(prng) = self.fallback.as_mut() {
            return prng.next_u32();
        }

        let mut buf = [0u8; 4];
        match OsRng.try_fill_bytes(&mut buf) {
            Ok(()) => u32::from_ne_bytes(buf),
            Err(e) => {
                debug!("OS entropy unavailable ({e}), switching to PRNG");
                let seed = SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_nanos() as u64)
                    .unwrap_or(0);
                let mut prng = StdRng::seed_from_u64(seed);
                let v = prng.next_u32();
                self.fallback = Some(prng);
                v
            }
        }
    }
}

impl Default for ShuffleRng {
    fn default() -> Self {
        Self::new()
    }
}

impl RngCore for ShuffleRng {
    fn next_u32(&mut self) -> u32 {
        ShuffleRng::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        (u64::from(self.next_u32()) << 32) | u64::from(self.next_u32())
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_ne_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn produces_values() {
        let mut rng = ShuffleRng::new();
        // Collisions over a handful of draws would point at a broken source.
        let draws: Vec<u32> = (0..8).map(|_| rng.next_u32()).collect();
        let distinct: std::collections::HashSet<_> = draws.iter().collect();
        assert!(distinct.len() > 1);
    }
}
