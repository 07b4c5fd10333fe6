//! Seedable random streams for parallel, reproducible sampling.
//!
//! A [`SeedSequence`] hands out one independent generator per work chunk.
//! Chunk `i` always gets the same stream for a given base seed, so results
//! do not depend on how many threads run the chunks.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSequence {
    base: u64,
}

// SplitMix64 finaliser
fn mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

impl SeedSequence {
    pub fn new(base: u64) -> Self {
        Self { base }
    }

    /// Use `seed` when given, otherwise draw a base seed from OS entropy.
    pub fn from_option(seed: Option<u64>) -> Self {
        Self::new(seed.unwrap_or_else(rand::random))
    }

    /// Generator for work chunk `index`.
    pub fn stream(&self, index: u64) -> StdRng {
        StdRng::seed_from_u64(mix(self.base ^ mix(index)))
    }
}

/// Split `total` iterations into `(chunk_index, start, len)` blocks of at most `chunk`.
pub fn chunks(total: usize, chunk: usize) -> Vec<(u64, usize, usize)> {
    let chunk = chunk.max(1);
    (0..total.div_ceil(chunk))
        .map(|i| {
            let start = i * chunk;
            (i as u64, start, chunk.min(total - start))
        })
        .collect()
}
