use cvm_core::derive_substream_seed;

/// Seed of the `counter`-th sampled structure.
pub fn sample_seed(master_seed: u64, counter: u64) -> u64 {
    derive_substream_seed(master_seed, counter)
}

/// Seed of the basin-hopping stream at one temperature.
pub fn hop_seed(master_seed: u64, temperature: f64) -> u64 {
    derive_substream_seed(master_seed ^ 0xA5A5_A5A5_A5A5_A5A5, temperature.to_bits())
}
