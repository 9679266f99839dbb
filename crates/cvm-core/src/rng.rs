//! Seeded random streams.
//!
//! Every stochastic step of a sweep (each sampled structure, each basin hop)
//! draws from its own stream. A stream seed is SipHash-1-3 of
//! `(master_seed, stream_id)` under zero keys, so a run replays exactly from
//! its master seed.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use siphasher::sip::SipHasher13;

/// One seeded random stream.
#[derive(Debug, Clone)]
pub struct RngHandle {
    stream: StdRng,
}

impl RngHandle {
    /// Stream seeded directly with `seed`.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            stream: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream `substream` of `master_seed`.
    pub fn substream(master_seed: u64, substream: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, substream))
    }

    /// Uniform draw in `[0, 1)`.
    pub fn unit(&mut self) -> f64 {
        self.stream.gen::<f64>()
    }

    /// Normal draw with zero mean and standard deviation `sigma`.
    pub fn gaussian(&mut self, sigma: f64) -> f64 {
        let z: f64 = self.stream.sample(StandardNormal);
        sigma * z
    }

    /// Uniform permutation of `items` in place.
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        items.shuffle(&mut self.stream);
    }

    /// Raw 64-bit draw.
    pub fn next_u64(&mut self) -> u64 {
        self.stream.gen()
    }
}

/// Seed of stream `substream` under `master_seed`.
pub fn derive_substream_seed(master_seed: u64, substream: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write(&master_seed.to_le_bytes());
    hasher.write(&substream.to_le_bytes());
    hasher.finish()
}
