//! Sharder implementation.
//!
//! The hash function, its seed, and the normalization into shards are a compatibility contract:
//! every SDK must place a given bucketing key into the same shard, so none of them can change
//! without reassigning users to different variations.

pub trait Sharder {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u32) -> u32;
}

/// The default (and only) sharder: 32-bit MurmurHash3 (x86 variant).
pub struct Murmur3Sharder;

impl Murmur3Sharder {
    pub const SEED: u32 = 1;
}

impl Sharder for Murmur3Sharder {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u32) -> u32 {
        let mut bytes = input.as_ref();
        let hash = murmur3::murmur3_32(&mut bytes, Self::SEED)
            .expect("reading from an in-memory slice should not fail");
        scale_to_shards(hash, total_shards)
    }
}

/// Map a 32-bit hash into `[0, total_shards)` as `floor(hash / 2^32 * total_shards)`.
///
/// Integer arithmetic keeps the result exact (the product fits in 64 bits).
fn scale_to_shards(hash: u32, total_shards: u32) -> u32 {
    ((u64::from(hash) * u64::from(total_shards)) >> 32) as u32
}

#[cfg(test)]
pub(crate) struct DeterministicSharder(pub std::collections::HashMap<String, u32>);

#[cfg(test)]
impl Sharder for DeterministicSharder {
    fn get_shard(&self, input: impl AsRef<[u8]>, total_shards: u32) -> u32 {
        let input = String::from_utf8_lossy(input.as_ref());
        self.0.get(input.as_ref()).copied().unwrap_or(0) % total_shards
    }
}
